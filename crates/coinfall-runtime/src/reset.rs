//! Scheduled statistics reset
//!
//! Resets fire at a local time of day on a daily, weekly (Mondays) or
//! monthly (the 1st) cadence. The first deadline comes from calendar math;
//! after each fire the next one is re-armed a fixed interval later (1, 7 or
//! 30 days).

use crate::jobs::guarded;
use chrono::{Datelike, Days, Local, Months, NaiveDateTime, NaiveTime, Weekday};
use coinfall_core::config::StatisticsConfig;
use coinfall_core::World;
use coinfall_db::StatisticsReset;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Message sent to present players after a reset
pub const RESET_BROADCAST: &str = "Currency statistics have been reset!";

/// How often statistics are reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    /// Lenient parse; anything unrecognised is `Daily`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Cadence::Daily,
            "WEEKLY" => Cadence::Weekly,
            "MONTHLY" => Cadence::Monthly,
            other => {
                warn!(cadence = other, "Unknown reset type, using DAILY");
                Cadence::Daily
            }
        }
    }

    /// Whole days between consecutive resets
    pub fn days(&self) -> u64 {
        match self {
            Cadence::Daily => 1,
            Cadence::Weekly => 7,
            Cadence::Monthly => 30,
        }
    }

    /// Time between consecutive resets
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.days() * 24 * 60 * 60)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Daily => write!(f, "DAILY"),
            Cadence::Weekly => write!(f, "WEEKLY"),
            Cadence::Monthly => write!(f, "MONTHLY"),
        }
    }
}

/// Parse `HH:MM`; anything else is midnight
pub fn parse_reset_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").unwrap_or_else(|e| {
        warn!(time = s, error = %e, "Invalid reset time, using 00:00");
        NaiveTime::MIN
    })
}

/// First reset strictly after `now`
pub fn next_deadline(cadence: Cadence, at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date();
    let today_at = today.and_time(at);
    match cadence {
        Cadence::Daily => {
            if now < today_at {
                today_at
            } else {
                today_at + Days::new(1)
            }
        }
        Cadence::Weekly => {
            if today.weekday() == Weekday::Mon && now < today_at {
                return today_at;
            }
            let ahead = 7 - u64::from(today.weekday().num_days_from_monday());
            today_at + Days::new(ahead)
        }
        Cadence::Monthly => {
            if today.day() == 1 && now < today_at {
                return today_at;
            }
            let first_of_month = today_at - Days::new(u64::from(today.day0()));
            first_of_month
                .checked_add_months(Months::new(1))
                .unwrap_or(first_of_month + Days::new(30))
        }
    }
}

type NowFn = dyn Fn() -> NaiveDateTime + Send + Sync;

/// Runs statistics resets on their wall-clock schedule
pub struct ResetScheduler {
    config: StatisticsConfig,
    target: Arc<dyn StatisticsReset>,
    world: Arc<dyn World>,
    now: Arc<NowFn>,
    task: Mutex<Option<JoinHandle<()>>>,
    next_fire: Arc<Mutex<Option<NaiveDateTime>>>,
}

impl ResetScheduler {
    pub fn new(
        config: StatisticsConfig,
        target: Arc<dyn StatisticsReset>,
        world: Arc<dyn World>,
    ) -> Self {
        Self {
            config,
            target,
            world,
            now: Arc::new(|| Local::now().naive_local()),
            task: Mutex::new(None),
            next_fire: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the wall clock used for deadline math
    pub fn with_wall_clock(
        mut self,
        now: impl Fn() -> NaiveDateTime + Send + Sync + 'static,
    ) -> Self {
        self.now = Arc::new(now);
        self
    }

    pub fn cadence(&self) -> Cadence {
        Cadence::parse(&self.config.reset_type)
    }

    /// Schedule resets, replacing any running schedule
    ///
    /// Returns `false` and stays stopped when resets are disabled.
    pub fn start(&self, handle: &Handle) -> bool {
        self.stop();
        if !self.config.reset_enabled {
            info!("Statistics reset disabled");
            return false;
        }

        let cadence = self.cadence();
        let at = parse_reset_time(&self.config.reset_time);
        let now = (self.now)();
        let first = next_deadline(cadence, at, now);
        let delay = (first - now).to_std().unwrap_or(Duration::ZERO);
        let interval = cadence.interval();
        let step = Days::new(cadence.days());
        *self.next_fire.lock() = Some(first);

        info!(
            %cadence,
            next = %first,
            delay_secs = delay.as_secs(),
            "Statistics reset scheduled"
        );

        let target = self.target.clone();
        let world = self.world.clone();
        let next_fire = self.next_fire.clone();
        let task = handle.spawn(async move {
            let mut deadline = Instant::now() + delay;
            let mut wall = first;
            loop {
                tokio::time::sleep_until(deadline).await;
                fire(target.as_ref(), world.as_ref());
                deadline += interval;
                wall = wall + step;
                *next_fire.lock() = Some(wall);
            }
        });
        *self.task.lock() = Some(task);
        true
    }

    /// Cancel the schedule; safe to call when stopped
    pub fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.abort();
            info!("Statistics reset stopped");
        }
        *self.next_fire.lock() = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Wall-clock time of the next reset, if scheduled
    pub fn next_fire(&self) -> Option<NaiveDateTime> {
        *self.next_fire.lock()
    }
}

impl Drop for ResetScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

fn fire(target: &dyn StatisticsReset, world: &dyn World) {
    match guarded("statistics-reset", || target.reset_statistics()) {
        Ok(Ok(cleared)) => {
            info!(cleared, "Statistics reset");
            world.broadcast(RESET_BROADCAST);
        }
        Ok(Err(e)) => error!(error = %e, "Statistics reset failed"),
        Err(e) => error!(error = %e, "Statistics reset failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use coinfall_core::{Location, MemoryWorld, PlayerId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_daily_deadline() {
        // Wednesday 2024-05-15
        let now = at(2024, 5, 15, 13, 0);
        assert_eq!(
            next_deadline(Cadence::Daily, time(0, 0), now),
            at(2024, 5, 16, 0, 0)
        );
        assert_eq!(
            next_deadline(Cadence::Daily, time(18, 30), now),
            at(2024, 5, 15, 18, 30)
        );
        // exactly at the target rolls forward
        assert_eq!(
            next_deadline(Cadence::Daily, time(13, 0), now),
            at(2024, 5, 16, 13, 0)
        );
    }

    #[test]
    fn test_weekly_deadline() {
        let monday_morning = at(2024, 5, 13, 6, 0);
        assert_eq!(
            next_deadline(Cadence::Weekly, time(12, 0), monday_morning),
            at(2024, 5, 13, 12, 0)
        );
        let monday_evening = at(2024, 5, 13, 20, 0);
        assert_eq!(
            next_deadline(Cadence::Weekly, time(12, 0), monday_evening),
            at(2024, 5, 20, 12, 0)
        );
        let sunday = at(2024, 5, 19, 23, 0);
        assert_eq!(
            next_deadline(Cadence::Weekly, time(0, 0), sunday),
            at(2024, 5, 20, 0, 0)
        );
    }

    #[test]
    fn test_monthly_deadline() {
        let first = at(2024, 5, 1, 0, 0);
        assert_eq!(
            next_deadline(Cadence::Monthly, time(9, 0), first),
            at(2024, 5, 1, 9, 0)
        );
        let mid_month = at(2024, 5, 15, 13, 0);
        assert_eq!(
            next_deadline(Cadence::Monthly, time(0, 0), mid_month),
            at(2024, 6, 1, 0, 0)
        );
        let december = at(2024, 12, 31, 23, 59);
        assert_eq!(
            next_deadline(Cadence::Monthly, time(0, 0), december),
            at(2025, 1, 1, 0, 0)
        );
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(Cadence::parse("weekly"), Cadence::Weekly);
        assert_eq!(Cadence::parse("HOURLY"), Cadence::Daily);
        assert_eq!(parse_reset_time("06:30"), time(6, 30));
        assert_eq!(parse_reset_time("25:99"), NaiveTime::MIN);
        assert_eq!(parse_reset_time("noon"), NaiveTime::MIN);
        assert_eq!(Cadence::Monthly.interval(), Duration::from_secs(30 * 86_400));
    }

    #[derive(Default)]
    struct CountingReset {
        calls: AtomicUsize,
    }

    impl StatisticsReset for CountingReset {
        fn reset_statistics(&self) -> coinfall_db::Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    fn scheduler(
        config: StatisticsConfig,
    ) -> (Arc<CountingReset>, Arc<MemoryWorld>, ResetScheduler) {
        let target = Arc::new(CountingReset::default());
        let world = Arc::new(MemoryWorld::new());
        let scheduler = ResetScheduler::new(config, target.clone(), world.clone())
            .with_wall_clock(|| at(2024, 5, 15, 13, 0));
        (target, world, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_reset_fires_and_rearms() {
        let (target, world, scheduler) = scheduler(StatisticsConfig::default());
        world.upsert_player(PlayerId::new(1), "alex", Location::new("world", 0.0, 0.0, 0.0));

        assert!(scheduler.start(&Handle::current()));
        assert!(scheduler.is_scheduled());
        assert_eq!(scheduler.next_fire(), Some(at(2024, 5, 16, 0, 0)));

        let hour = Duration::from_secs(3_600);
        tokio::time::sleep(hour * 10).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(hour * 2).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.next_fire(), Some(at(2024, 5, 17, 0, 0)));
        assert_eq!(world.messages(), vec![(None, RESET_BROADCAST.to_string())]);

        tokio::time::sleep(hour * 24).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_scheduled());
        tokio::time::sleep(hour * 48).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_schedule() {
        let (target, _world, scheduler) = scheduler(StatisticsConfig::default());

        assert!(scheduler.start(&Handle::current()));
        assert!(scheduler.start(&Handle::current()));

        tokio::time::sleep(Duration::from_secs(12 * 3_600)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_stays_stopped() {
        let (_target, _world, scheduler) = scheduler(StatisticsConfig {
            reset_enabled: false,
            ..StatisticsConfig::default()
        });

        assert!(!scheduler.start(&Handle::current()));
        assert!(!scheduler.is_scheduled());
        assert_eq!(scheduler.next_fire(), None);
    }

    #[test]
    fn test_failed_reset_skips_broadcast() {
        struct Failing;
        impl StatisticsReset for Failing {
            fn reset_statistics(&self) -> coinfall_db::Result<usize> {
                Err(coinfall_db::Error::Database("locked".to_string()))
            }
        }
        struct Panicking;
        impl StatisticsReset for Panicking {
            fn reset_statistics(&self) -> coinfall_db::Result<usize> {
                panic!("reset exploded")
            }
        }

        let world = MemoryWorld::new();
        fire(&Failing, &world);
        fire(&Panicking, &world);
        assert!(world.messages().is_empty());
    }
}
