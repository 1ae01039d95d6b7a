//! Periodic sweep over tracked currency entities
//!
//! A sweep runs in three passes:
//! 1. Expiry over the whole registry: anything older than the despawn time
//!    is removed from the world and forgotten.
//! 2. A bounded batch, in registration order, that drops entities the world
//!    no longer knows and toggles name visibility by observer proximity.
//! 3. Within the same batch, nearby entities are stacked into the first one
//!    of their neighbourhood.
//!
//! Per-entity failures are logged and counted; the sweep always finishes.

use crate::config::OptimizationConfig;
use crate::time::duration_millis;
use crate::{
    CurrencyRegistry, EntityId, LabelTracker, Location, Millis, Observer, Result, TimeSource,
    World,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entities visited in the bounded batch
    pub checked: usize,
    /// Entities the world had already lost
    pub invalid: usize,
    /// Entities removed for age
    pub expired: usize,
    /// Names switched on
    pub shown: usize,
    /// Names switched off
    pub hidden: usize,
    /// Stacks formed
    pub merges: usize,
    /// Entities folded into a stack
    pub absorbed: usize,
    /// Per-entity errors that were logged and skipped
    pub failures: usize,
}

/// Expiry, culling and stacking over the currency registry
pub struct Optimizer {
    registry: Arc<CurrencyRegistry>,
    labels: Arc<LabelTracker>,
    world: Arc<dyn World>,
    clock: Arc<dyn TimeSource>,
    config: OptimizationConfig,
}

impl Optimizer {
    pub fn new(
        registry: Arc<CurrencyRegistry>,
        labels: Arc<LabelTracker>,
        world: Arc<dyn World>,
        clock: Arc<dyn TimeSource>,
        config: OptimizationConfig,
    ) -> Self {
        Self {
            registry,
            labels,
            world,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    fn despawn_millis(&self) -> Millis {
        duration_millis(self.config.despawn_time())
    }

    /// Run one sweep
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.clock.now_millis();
        let perf = &self.config.performance;

        let expired = self.registry.drain_expired(now, self.despawn_millis());
        for entity in &expired {
            self.world.remove(*entity);
        }
        report.expired = expired.len();

        let tracked = self.registry.len();
        if perf.warning_threshold > 0 && tracked > perf.warning_threshold {
            warn!(
                tracked,
                threshold = perf.warning_threshold,
                "High number of currency entities, consider raising the stack radius"
            );
        }

        let batch = self.registry.snapshot(perf.max_items_per_sweep);
        if batch.is_empty() {
            return report;
        }
        let observers = self.world.observers();
        let mut processed: HashSet<EntityId> = HashSet::new();

        for (entity, record) in batch {
            report.checked += 1;
            // Absorbed by an earlier stack in this sweep
            if !self.registry.contains(entity) {
                continue;
            }
            let location = match self.world.location(entity) {
                Some(location) if self.world.is_valid(entity) => location,
                _ => {
                    self.registry.unregister(entity);
                    report.invalid += 1;
                    continue;
                }
            };

            match self.cull(entity, record.name_visible, &location, &observers) {
                Ok(Some(true)) => report.shown += 1,
                Ok(Some(false)) => report.hidden += 1,
                Ok(None) => {}
                Err(e) if e.is_gone() => {
                    self.registry.unregister(entity);
                    report.invalid += 1;
                    continue;
                }
                Err(e) => {
                    warn!(%entity, error = %e, "Visibility update failed");
                    report.failures += 1;
                }
            }

            if self.config.stack_currency
                && !processed.contains(&entity)
                && processed.len() < perf.max_stack_checks * 2
            {
                if let Err(e) = self.stack(entity, &location, now, &mut processed, &mut report) {
                    warn!(%entity, error = %e, "Stacking failed");
                    report.failures += 1;
                }
            }
        }

        if report != SweepReport::default() {
            debug!(
                checked = report.checked,
                invalid = report.invalid,
                expired = report.expired,
                merges = report.merges,
                absorbed = report.absorbed,
                "Sweep finished"
            );
        }
        report
    }

    /// Push name visibility if it changed; returns the new state when pushed
    fn cull(
        &self,
        entity: EntityId,
        current: bool,
        at: &Location,
        observers: &[Observer],
    ) -> Result<Option<bool>> {
        let visible = observers
            .iter()
            .any(|o| o.location.within(at, self.config.hide_distance));
        if visible == current {
            return Ok(None);
        }
        self.world.set_name_visible(entity, visible)?;
        self.registry.set_name_visible(entity, visible);
        Ok(Some(visible))
    }

    /// Fold nearby entities into `origin`
    fn stack(
        &self,
        origin: EntityId,
        at: &Location,
        now: Millis,
        processed: &mut HashSet<EntityId>,
        report: &mut SweepReport,
    ) -> Result<()> {
        processed.insert(origin);
        let perf = &self.config.performance;
        let despawn = self.despawn_millis();
        let candidates = self
            .registry
            .scan(perf.max_stack_checks, |id, _| {
                id != origin && !processed.contains(&id)
            });

        let mut nearby = Vec::new();
        for (candidate, record) in candidates {
            if nearby.len() >= perf.max_stack_size {
                break;
            }
            if record.age(now) > despawn || !self.world.is_valid(candidate) {
                continue;
            }
            let Some(location) = self.world.location(candidate) else {
                continue;
            };
            if at.within(&location, self.config.stack_radius) {
                nearby.push(candidate);
            }
        }
        if nearby.is_empty() {
            return Ok(());
        }

        let Some(absorbed) = self.registry.absorb(origin, &nearby) else {
            return Ok(());
        };
        for entity in &absorbed.entities {
            self.world.remove(*entity);
        }
        processed.extend(absorbed.entities.iter().copied());

        if absorbed.entities.is_empty() {
            return Ok(());
        }
        report.merges += 1;
        report.absorbed += absorbed.entities.len();
        if absorbed.entities.len() > 3 {
            debug!(
                %origin,
                merged = absorbed.entities.len(),
                total = absorbed.total,
                "Stacked currency entities"
            );
        }

        let pushed = self.world.set_amount(origin, absorbed.total);
        let labelled = self.labels.set_amount(origin, absorbed.total);
        for result in [pushed, labelled] {
            match result {
                Err(e) if !e.is_gone() => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}
