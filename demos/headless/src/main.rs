//! Headless coinfall host
//!
//! Runs the plugin against an in-memory world for a short simulated
//! session: two players kill mobs, mine and place blocks, and walk over
//! the drops. The sweep and label pass run as they would on a server.
//!
//! Usage: `headless [config.ron]`. Set `RUST_LOG=debug` for per-entity logs.

use coinfall_core::{
    Config, CurrencySource, DropRng, Location, MemoryEconomy, MemoryWorld, PlayerId, SystemClock,
    World,
};
use coinfall_db::Store;
use coinfall_runtime::{CoinFall, PickupOutcome};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TICK: Duration = Duration::from_millis(50);
const SESSION_TICKS: u64 = 200;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/headless/config/coinfall.ron".to_string());
    let config = if Path::new(&config_path).exists() {
        info!(path = %config_path, "Loading configuration");
        Config::load(&config_path)?
    } else {
        warn!(path = %config_path, "Configuration not found, using defaults");
        Config::default()
    };

    let store = if config.anti_duplication.persist_data {
        Arc::new(Store::open(&config.storage.path)?)
    } else {
        Arc::new(Store::in_memory()?)
    };

    let world = Arc::new(MemoryWorld::new());
    let economy = Arc::new(MemoryEconomy::new());
    let plugin = CoinFall::new(
        config,
        world.clone(),
        economy.clone(),
        Arc::new(SystemClock),
        store,
    )
    .with_rng(DropRng::new(0xC0FFEE));

    let alex = PlayerId::new(1);
    let sam = PlayerId::new(2);
    world.upsert_player(alex, "Alex", Location::new("world", 0.0, 64.0, 0.0));
    world.upsert_player(sam, "Sam", Location::new("world", 40.0, 64.0, 0.0));

    plugin.enable(&Handle::current());

    let mut interval = tokio::time::interval(TICK);
    for tick in 0..SESSION_TICKS {
        interval.tick().await;
        plugin.tick();

        let x = (tick % 8) as f64 * 0.5;
        let spot = Location::new("world", x, 64.0, 1.0);
        match tick % 20 {
            0 => {
                plugin.on_entity_death(Some(alex), "zombie", &spot)?;
            }
            5 => {
                plugin.on_entity_death(None, "skeleton", &spot)?;
            }
            10 => {
                // place then break: the ledger suppresses the drop
                plugin.on_block_place(&spot);
                plugin.on_block_break(alex, false, "dirt", &spot)?;
            }
            15 => {
                plugin.on_block_break(sam, false, "diamond_ore", &spot)?;
            }
            _ => {}
        }

        // every second the nearest player walks over one drop
        if tick % 20 == 19 {
            let drops = world.currency_ids();
            if let Some(entity) = drops.first() {
                match plugin.on_pickup(alex, "Alex", *entity)? {
                    PickupOutcome::Credited { amount } => info!(amount, "Alex picked up currency"),
                    other => info!(?other, "Pickup"),
                }
            }
        }
    }

    plugin.drop_currency(
        &Location::new("world", 100.0, 64.0, 100.0),
        1,
        CurrencySource::Unknown,
    )?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let tracked = plugin.registry().len();
    info!(
        tracked,
        on_ground = plugin.registry().total_amount(),
        alex = economy.balance(alex),
        placed_blocks = plugin.ledger().len(),
        next_reset = ?plugin.reset_scheduler().next_fire(),
        "Session finished"
    );
    if let Some(earnings) = plugin.store().earnings(alex)? {
        info!(
            from_mobs = earnings.from_mobs,
            from_blocks = earnings.from_blocks,
            total = earnings.total,
            "Alex earnings"
        );
    }
    for observer in world.observers() {
        info!(player = %observer.name, "Still online");
    }

    plugin.disable();
    Ok(())
}
