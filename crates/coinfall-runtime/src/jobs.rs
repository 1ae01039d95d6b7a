//! Repeating background jobs
//!
//! Each job is one tokio task looping over an interval. The work itself runs
//! on the blocking pool, since it calls into the host world synchronously.
//! Iterations run sequentially, so a slow sweep delays the next one instead
//! of overlapping it. A failing or panicking iteration is logged and the
//! loop carries on.

use crate::error::{Error, Result};
use coinfall_core::Optimizer;
use coinfall_db::PlacementLedger;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Run `work`, turning a panic into [`Error::JobPanicked`]
pub fn guarded<T>(job: &'static str, work: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(work)).map_err(|payload| Error::JobPanicked {
        job,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `work` every `every`, first after one full period
pub fn spawn_repeating<F>(
    handle: &Handle,
    job: &'static str,
    every: Duration,
    work: F,
) -> JoinHandle<()>
where
    F: Fn() + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let every = every.max(Duration::from_millis(1));
    debug!(job, every_ms = every.as_millis() as u64, "Starting job");
    handle.spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let work = work.clone();
            match tokio::task::spawn_blocking(move || guarded(job, || (*work)())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(job, error = %e, "Job iteration failed"),
                Err(e) => error!(job, error = %e, "Job iteration did not complete"),
            }
        }
    })
}

/// Start the optimizer sweep at its configured interval
pub fn spawn_sweep(handle: &Handle, optimizer: Arc<Optimizer>) -> JoinHandle<()> {
    let every = optimizer.config().sweep_interval();
    spawn_repeating(handle, "sweep", every, move || {
        let report = optimizer.sweep();
        if report.failures > 0 {
            warn!(failures = report.failures, "Sweep finished with failures");
        }
    })
}

/// Start periodic ledger pruning; `None` when the ledger or the job is disabled
pub fn spawn_ledger_cleanup(
    handle: &Handle,
    ledger: Arc<PlacementLedger>,
) -> Option<JoinHandle<()>> {
    if !ledger.is_enabled() {
        return None;
    }
    let every = ledger.config().cleanup_interval()?;
    Some(spawn_repeating(handle, "ledger-cleanup", every, move || {
        let removed = ledger.cleanup_expired();
        if removed > 0 {
            info!(removed, remaining = ledger.len(), "Cleaned up placed blocks");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinfall_core::config::AntiDuplicationConfig;
    use coinfall_core::{BlockKey, ManualClock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_guarded_catches_panics() {
        assert_eq!(guarded("ok", || 5).unwrap(), 5);

        let err = guarded("boom", || -> u32 { panic!("kaboom") }).unwrap_err();
        match err {
            Error::JobPanicked { job, message } => {
                assert_eq!(job, "boom");
                assert_eq!(message, "kaboom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_job_survives_panics() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = spawn_repeating(
            &Handle::current(),
            "flaky",
            Duration::from_secs(1),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    panic!("first run fails");
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        task.abort();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_off_the_async_thread() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let record = seen.clone();
        let task = spawn_repeating(
            &Handle::current(),
            "where",
            Duration::from_secs(1),
            move || {
                *record.lock() = Some(std::thread::current().id());
            },
        );

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        task.abort();

        let worker = seen.lock().take().unwrap();
        assert_ne!(worker, std::thread::current().id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_cleanup_job() {
        let clock = Arc::new(ManualClock::new(0));
        let ledger = Arc::new(PlacementLedger::new(
            AntiDuplicationConfig {
                auto_cleanup_interval_mins: 1,
                max_block_age_mins: 1,
                ..AntiDuplicationConfig::default()
            },
            clock.clone(),
        ));
        ledger.record(BlockKey::new("world", 10, 64, 10));
        clock.set(70_000);

        let task = spawn_ledger_cleanup(&Handle::current(), ledger.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(ledger.is_empty());
        task.abort();
    }

    #[tokio::test]
    async fn test_ledger_cleanup_disabled() {
        let ledger = Arc::new(PlacementLedger::new(
            AntiDuplicationConfig {
                auto_cleanup_interval_mins: 0,
                ..AntiDuplicationConfig::default()
            },
            Arc::new(ManualClock::new(0)),
        ));
        assert!(spawn_ledger_cleanup(&Handle::current(), ledger).is_none());
    }
}
