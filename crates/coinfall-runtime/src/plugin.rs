//! The plugin facade
//!
//! Hosts forward world events here: deaths, block breaks and placements,
//! pickups, and the per-tick label pass. `enable`/`disable` start and stop
//! the background jobs.

use crate::error::Result;
use crate::jobs;
use crate::reset::ResetScheduler;
use coinfall_core::{
    Config, CurrencyRegistry, CurrencySource, DropRng, DropTable, Economy, EntityId, LabelTracker,
    Location, Optimizer, PlayerId, SweepReport, TimeSource, World, WorldFilter,
};
use coinfall_db::{PlacementLedger, Store};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What happened to a pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupOutcome {
    /// Not a tracked currency entity, or a disabled world
    Ignored,
    /// The player was paid
    Credited { amount: u32 },
    /// The economy refused; the currency was dropped again
    Refunded {
        amount: u32,
        respawned: Option<EntityId>,
    },
}

/// Coinfall wired to one host world
pub struct CoinFall {
    config: Config,
    world: Arc<dyn World>,
    economy: Arc<dyn Economy>,
    labels: Arc<LabelTracker>,
    registry: Arc<CurrencyRegistry>,
    optimizer: Arc<Optimizer>,
    ledger: Arc<PlacementLedger>,
    store: Arc<Store>,
    drops: DropTable,
    worlds: WorldFilter,
    rng: Mutex<DropRng>,
    reset: ResetScheduler,
    jobs: Mutex<Vec<JoinHandle<()>>>,
}

impl CoinFall {
    pub fn new(
        config: Config,
        world: Arc<dyn World>,
        economy: Arc<dyn Economy>,
        clock: Arc<dyn TimeSource>,
        store: Arc<Store>,
    ) -> Self {
        let labels = Arc::new(LabelTracker::new(world.clone(), config.labels.clone()));
        let registry = Arc::new(CurrencyRegistry::new(labels.clone(), clock.clone()));
        let optimizer = Arc::new(Optimizer::new(
            registry.clone(),
            labels.clone(),
            world.clone(),
            clock.clone(),
            config.optimization.clone(),
        ));
        let ledger = Arc::new(PlacementLedger::with_store(
            config.anti_duplication.clone(),
            clock,
            store.clone(),
        ));
        let reset = ResetScheduler::new(config.statistics.clone(), store.clone(), world.clone());

        Self {
            drops: DropTable::from_config(&config.drops),
            worlds: WorldFilter::from_config(&config.worlds),
            rng: Mutex::new(DropRng::default()),
            jobs: Mutex::new(Vec::new()),
            config,
            world,
            economy,
            labels,
            registry,
            optimizer,
            ledger,
            store,
            reset,
        }
    }

    /// Replace the drop RNG, e.g. with a seeded one
    pub fn with_rng(self, rng: DropRng) -> Self {
        *self.rng.lock() = rng;
        self
    }

    /// Replace the reset scheduler, e.g. one with a fixed wall clock
    pub fn with_reset_scheduler(mut self, reset: ResetScheduler) -> Self {
        self.reset = reset;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }

    pub fn labels(&self) -> &LabelTracker {
        &self.labels
    }

    pub fn ledger(&self) -> &PlacementLedger {
        &self.ledger
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn reset_scheduler(&self) -> &ResetScheduler {
        &self.reset
    }

    /// Spawn and track a currency entity
    pub fn drop_currency(
        &self,
        at: &Location,
        amount: u32,
        source: CurrencySource,
    ) -> Result<EntityId> {
        let entity = self.world.spawn_currency(at, amount, source)?;
        if let Err(e) = self.registry.register(entity, amount, source) {
            self.world.remove(entity);
            return Err(e.into());
        }
        debug!(%entity, amount, %source, "Dropped currency");
        Ok(entity)
    }

    /// A creature died; players' kills may drop currency
    pub fn on_entity_death(
        &self,
        killer: Option<PlayerId>,
        kind: &str,
        at: &Location,
    ) -> Result<Option<EntityId>> {
        if killer.is_none() || !self.worlds.is_enabled(&at.world) {
            return Ok(None);
        }
        let rolled = self.drops.mob(kind).roll(&mut self.rng.lock());
        match rolled {
            Some(amount) => self.drop_currency(at, amount, CurrencySource::Mob).map(Some),
            None => Ok(None),
        }
    }

    /// A player broke a block at `at`
    ///
    /// Blocks recorded in the ledger are forgotten and drop nothing.
    pub fn on_block_break(
        &self,
        player: PlayerId,
        creative: bool,
        kind: &str,
        at: &Location,
    ) -> Result<Option<EntityId>> {
        if !self.worlds.is_enabled(&at.world) {
            return Ok(None);
        }
        let key = at.block();
        if self.ledger.contains(&key) {
            self.ledger.remove(&key);
            debug!(%player, %key, "Player-placed block broken, no drop");
            return Ok(None);
        }
        if creative {
            return Ok(None);
        }
        let rolled = self.drops.block(kind).roll(&mut self.rng.lock());
        match rolled {
            Some(amount) => self
                .drop_currency(&key.center(), amount, CurrencySource::Block)
                .map(Some),
            None => Ok(None),
        }
    }

    /// A player placed a block at `at`
    pub fn on_block_place(&self, at: &Location) {
        if self.worlds.is_enabled(&at.world) {
            self.ledger.record(at.block());
        }
    }

    /// A player touched `entity`; pay out if it is tracked currency
    pub fn on_pickup(
        &self,
        player: PlayerId,
        player_name: &str,
        entity: EntityId,
    ) -> Result<PickupOutcome> {
        let Some(at) = self.world.location(entity) else {
            self.registry.unregister(entity);
            return Ok(PickupOutcome::Ignored);
        };
        if !self.worlds.is_enabled(&at.world) {
            return Ok(PickupOutcome::Ignored);
        }
        let Some(record) = self.registry.take(entity) else {
            return Ok(PickupOutcome::Ignored);
        };
        self.world.remove(entity);

        let amount = record.amount;
        if self.economy.deposit(player, amount) {
            if let Err(e) = self
                .store
                .add_earnings(player, player_name, amount, record.source)
            {
                warn!(%player, error = %e, "Could not record earnings");
            }
            self.world.send_message(
                player,
                &format!("+{} {}", amount, self.config.labels.glyph),
            );
            return Ok(PickupOutcome::Credited { amount });
        }

        warn!(%player, amount, "Economy refused deposit, dropping currency again");
        self.world
            .send_message(player, "Transaction failed, the currency was dropped again.");
        let respawned = match self.drop_currency(&at, amount, record.source) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(%player, amount, error = %e, "Could not drop currency again");
                None
            }
        };
        Ok(PickupOutcome::Refunded { amount, respawned })
    }

    /// Per-tick label pass; call from the tick thread
    pub fn tick(&self) -> usize {
        self.labels.tick()
    }

    /// Run one sweep now
    pub fn sweep(&self) -> SweepReport {
        self.optimizer.sweep()
    }

    /// Prune the ledger now; returns the number of records removed
    pub fn cleanup_placed_blocks(&self) -> usize {
        self.ledger.cleanup_expired()
    }

    /// Load persisted state and start the background jobs
    pub fn enable(&self, handle: &Handle) {
        self.stop_jobs();
        if let Err(e) = self.ledger.load() {
            warn!(error = %e, "Could not load placed blocks");
        }

        let mut running = vec![jobs::spawn_sweep(handle, self.optimizer.clone())];
        running.extend(jobs::spawn_ledger_cleanup(handle, self.ledger.clone()));
        *self.jobs.lock() = running;
        self.reset.start(handle);

        info!(
            sweep_ms = self.config.optimization.sweep_interval_ms,
            worlds = ?self.worlds,
            "Coinfall enabled"
        );
    }

    /// Stop jobs, remove every label and persist the ledger
    pub fn disable(&self) {
        self.reset.stop();
        self.stop_jobs();
        self.labels.remove_all();
        if let Err(e) = self.ledger.shutdown() {
            warn!(error = %e, "Could not save placed blocks");
        }
        info!("Coinfall disabled");
    }

    fn stop_jobs(&self) {
        let running = std::mem::take(&mut *self.jobs.lock());
        for job in running {
            job.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.jobs.lock().iter().any(|job| !job.is_finished())
    }
}

impl Drop for CoinFall {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().drain(..) {
            job.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinfall_core::config::DropRuleConfig;
    use coinfall_core::{ManualClock, MemoryEconomy, MemoryWorld, World};
    use std::time::Duration;

    struct Fixture {
        world: Arc<MemoryWorld>,
        economy: Arc<MemoryEconomy>,
        clock: Arc<ManualClock>,
        plugin: CoinFall,
    }

    fn fixture(config: Config) -> Fixture {
        let world = Arc::new(MemoryWorld::new());
        let economy = Arc::new(MemoryEconomy::new());
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(Store::in_memory().unwrap());
        let plugin = CoinFall::new(
            config,
            world.clone(),
            economy.clone(),
            clock.clone(),
            store,
        )
        .with_rng(DropRng::new(11));
        Fixture {
            world,
            economy,
            clock,
            plugin,
        }
    }

    fn fixed_drops() -> Config {
        let mut config = Config::default();
        config.drops.default_amount = "3".to_string();
        config
    }

    fn here() -> Location {
        Location::new("world", 10.3, 64.0, 10.8)
    }

    const STEVE: PlayerId = PlayerId(1);

    #[test]
    fn test_player_kill_drops_currency() {
        let f = fixture(fixed_drops());

        let coin = f
            .plugin
            .on_entity_death(Some(STEVE), "ZOMBIE", &here())
            .unwrap()
            .unwrap();

        let record = f.plugin.registry().get(coin).unwrap();
        assert_eq!(record.amount, 3);
        assert_eq!(record.source, CurrencySource::Mob);
        assert!(f.plugin.labels().label_of(coin).is_some());

        // no killer, no drop
        assert_eq!(f.plugin.on_entity_death(None, "zombie", &here()).unwrap(), None);
    }

    #[test]
    fn test_zero_chance_never_drops() {
        let mut config = fixed_drops();
        config.drops.mobs.insert(
            "bat".to_string(),
            DropRuleConfig {
                amount: None,
                chance: Some(0),
            },
        );
        let f = fixture(config);

        for _ in 0..50 {
            assert_eq!(f.plugin.on_entity_death(Some(STEVE), "bat", &here()).unwrap(), None);
        }
        assert!(f.world.currency_ids().is_empty());
    }

    #[test]
    fn test_placed_block_does_not_drop() {
        let f = fixture(fixed_drops());

        f.plugin.on_block_place(&here());
        assert!(f
            .plugin
            .ledger()
            .contains(&"world:10:64:10".parse().unwrap()));

        let first = f
            .plugin
            .on_block_break(STEVE, false, "stone", &here())
            .unwrap();
        assert_eq!(first, None);
        assert!(f.plugin.ledger().is_empty());

        // the same cell broken again after regrowth drops normally
        let second = f
            .plugin
            .on_block_break(STEVE, false, "stone", &here())
            .unwrap()
            .unwrap();
        assert_eq!(
            f.world.location(second),
            Some(Location::new("world", 10.5, 64.5, 10.5))
        );
        assert_eq!(
            f.plugin.registry().get(second).unwrap().source,
            CurrencySource::Block
        );
    }

    #[test]
    fn test_creative_breaks_never_drop() {
        let f = fixture(fixed_drops());
        assert_eq!(
            f.plugin.on_block_break(STEVE, true, "stone", &here()).unwrap(),
            None
        );
        assert!(f.plugin.registry().is_empty());
    }

    #[test]
    fn test_disabled_world_is_ignored() {
        let mut config = fixed_drops();
        config.worlds.mode = "blacklist".to_string();
        config.worlds.list = vec!["world".to_string()];
        let f = fixture(config);

        assert_eq!(f.plugin.on_entity_death(Some(STEVE), "zombie", &here()).unwrap(), None);
        f.plugin.on_block_place(&here());
        assert!(f.plugin.ledger().is_empty());
    }

    #[test]
    fn test_pickup_credits_player() {
        let f = fixture(fixed_drops());
        let coin = f
            .plugin
            .drop_currency(&here(), 4, CurrencySource::Block)
            .unwrap();

        let outcome = f.plugin.on_pickup(STEVE, "Steve", coin).unwrap();

        assert_eq!(outcome, PickupOutcome::Credited { amount: 4 });
        assert_eq!(f.economy.balance(STEVE), 4);
        assert!(!f.world.is_valid(coin));
        assert!(f.plugin.registry().is_empty());
        assert!(f.world.label_ids().is_empty());

        let earnings = f.plugin.store().earnings(STEVE).unwrap().unwrap();
        assert_eq!(earnings.from_blocks, 4);
        assert_eq!(earnings.total, 4);
        assert_eq!(f.world.messages(), vec![(Some(STEVE), "+4 ⛃".to_string())]);

        // second touch of the same entity is a no-op
        assert_eq!(
            f.plugin.on_pickup(STEVE, "Steve", coin).unwrap(),
            PickupOutcome::Ignored
        );
    }

    #[test]
    fn test_refused_deposit_drops_again() {
        let f = fixture(fixed_drops());
        let coin = f
            .plugin
            .drop_currency(&here(), 6, CurrencySource::Mob)
            .unwrap();
        f.economy.refuse_deposits(true);

        let outcome = f.plugin.on_pickup(STEVE, "Steve", coin).unwrap();

        let PickupOutcome::Refunded {
            amount: 6,
            respawned: Some(again),
        } = outcome
        else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_ne!(again, coin);
        assert_eq!(f.world.location(again), Some(here()));
        assert_eq!(f.plugin.registry().get(again).unwrap().amount, 6);
        assert_eq!(f.plugin.store().earnings(STEVE).unwrap(), None);
    }

    #[test]
    fn test_pickup_of_untracked_entity() {
        let f = fixture(fixed_drops());
        let stray = f
            .world
            .spawn_currency(&here(), 1, CurrencySource::Unknown)
            .unwrap();
        assert_eq!(
            f.plugin.on_pickup(STEVE, "Steve", stray).unwrap(),
            PickupOutcome::Ignored
        );
        assert!(f.world.is_valid(stray));
    }

    #[test]
    fn test_failed_spawn_is_reported() {
        let f = fixture(fixed_drops());
        f.world.refuse_spawns(true);
        assert!(f
            .plugin
            .on_entity_death(Some(STEVE), "zombie", &here())
            .is_err());
        assert!(f.plugin.registry().is_empty());
    }

    #[test]
    fn test_tick_moves_labels() {
        let f = fixture(fixed_drops());
        let coin = f
            .plugin
            .drop_currency(&here(), 2, CurrencySource::Mob)
            .unwrap();
        let label = f.plugin.labels().label_of(coin).unwrap();

        f.world
            .move_entity(coin, Location::new("world", 0.0, 60.0, 0.0));
        assert_eq!(f.plugin.tick(), 0);
        assert_eq!(
            f.world.location(label),
            Some(Location::new("world", 0.0, 60.5, 0.0))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_runs_sweeps_until_disabled() {
        let f = fixture(fixed_drops());
        let a = f
            .plugin
            .drop_currency(&here(), 5, CurrencySource::Mob)
            .unwrap();
        f.clock.set(1_000);
        f.plugin
            .drop_currency(&here().offset(1.0, 0.0, 0.0), 3, CurrencySource::Mob)
            .unwrap();
        f.clock.set(2_000);

        f.plugin.enable(&Handle::current());
        assert!(f.plugin.is_running());
        assert!(f.plugin.reset_scheduler().is_scheduled());

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(f.plugin.registry().len(), 1);
        assert_eq!(f.plugin.registry().get(a).unwrap().amount, 8);

        f.plugin.on_block_place(&here());
        f.plugin.disable();
        assert!(!f.plugin.is_running());
        assert!(!f.plugin.reset_scheduler().is_scheduled());
        assert!(f.world.label_ids().is_empty());
        assert!(f.plugin.ledger().is_empty());
    }
}
