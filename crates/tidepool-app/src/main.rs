//! Headless reef runner: builds a seeded world, steps it, and logs digests.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tidepool_core::{FishType, PlantType, TidepoolConfig, World};
use tidepool_policy::HeuristicPolicy;

const DEFAULT_TICKS: u64 = 10_000;
const LOG_INTERVAL: u64 = 500;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn parse_args() -> Result<(u64, Option<u64>)> {
    let mut ticks = DEFAULT_TICKS;
    let mut seed = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ticks" => {
                let value = args.next().context("--ticks needs a value")?;
                ticks = value.parse().context("--ticks must be an integer")?;
            }
            "--seed" => {
                let value = args.next().context("--seed needs a value")?;
                seed = Some(value.parse().context("--seed must be an integer")?);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok((ticks, seed))
}

fn bootstrap_world(seed: Option<u64>) -> Result<World> {
    let config = TidepoolConfig {
        rng_seed: seed,
        ..TidepoolConfig::default()
    };
    let mut world = World::new(
        config,
        vec![PlantType::kelp(), PlantType::coral()],
        vec![FishType::grazer(), FishType::hunter()],
        Box::new(HeuristicPolicy),
    )?;

    // A loose planting grid with grazers between the rows and a couple of
    // hunters patrolling the midline.
    let mut planted = 0u32;
    for row in 0..4 {
        for col in 0..8 {
            let x = -480.0 + col as f32 * 130.0;
            let y = -280.0 + row as f32 * 180.0;
            let species = ((row + col) % 2) as u16;
            if world.add_plant(x, y, species).is_some() {
                planted += 1;
            } else {
                warn!(x, y, species, "plant placement rejected");
            }
        }
    }
    for i in 0..12 {
        let x = -420.0 + i as f32 * 75.0;
        world.spawn_fish(x, 60.0, 0);
    }
    world.spawn_fish(-100.0, 0.0, 1);
    world.spawn_fish(100.0, 0.0, 1);

    info!(
        planted,
        fish = world.agents().count(),
        "world seeded"
    );
    Ok(world)
}

fn main() -> Result<()> {
    init_tracing();
    let (ticks, seed) = parse_args()?;
    let mut world = bootstrap_world(seed)?;
    info!(ticks, ?seed, "starting run");

    for _ in 0..ticks {
        let summary = world.step();
        if summary.tick.0 % LOG_INTERVAL == 0 {
            info!(
                tick = summary.tick.0,
                plants = summary.plant_nodes,
                corpses = summary.corpse_nodes,
                fish = summary.fish,
                chains = summary.chains,
                births = summary.births,
                deaths = summary.deaths,
                growth = summary.growth_events,
                "tick digest"
            );
        }
    }

    let faults = world.fault_counters();
    info!(
        orphaned_agents = faults.orphaned_agents,
        invalid_type_refs = faults.invalid_type_refs,
        dropped_spawns = faults.dropped_spawns,
        dropped_index_inserts = faults.dropped_index_inserts,
        "run complete"
    );
    Ok(())
}
