//! # Horde Simulation
//!
//! Runs the spawn coordinator against simulated gameplay and prints the
//! final pool populations.
//!
//! ## Usage
//!
//! ```bash
//! horde_sim --level the_beach --seconds 120 --config data/horde.toml
//! RUST_LOG=debug horde_sim --realtime --seconds 10
//! ```

use respawn::{HordeSim, LevelType, SimSettings, DEFAULT_CONFIG};
use respawn_spawner::SpawnerConfig;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut settings = SimSettings::default();
    let mut config_path: Option<String> = None;
    let mut seconds = 60u64;
    let mut realtime = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--level" | "-l" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<LevelType>() {
                        Ok(level) => settings.level = level,
                        Err(err) => {
                            eprintln!("{err}");
                            return ExitCode::FAILURE;
                        }
                    }
                    i += 1;
                }
            }
            "--seconds" | "-s" => {
                if i + 1 < args.len() {
                    seconds = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--tick-rate" | "-t" => {
                if i + 1 < args.len() {
                    settings.tick_rate = args[i + 1].parse().unwrap_or(settings.tick_rate);
                    i += 1;
                }
            }
            "--hit-chance" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<f64>() {
                        Ok(chance) if chance.is_finite() => settings.hit_chance = chance,
                        _ => {
                            eprintln!("invalid hit chance: {}", args[i + 1]);
                            return ExitCode::FAILURE;
                        }
                    }
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    settings.seed = args[i + 1].parse().unwrap_or(settings.seed);
                    i += 1;
                }
            }
            "--realtime" => realtime = true,
            "--help" | "-h" => {
                println!("Usage: horde_sim [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>        Spawner config (default: bundled horde.toml)");
                println!("  -l, --level <LEVEL>        farm | the_beach | the_wild_west (default: farm)");
                println!("  -s, --seconds <SECS>       Simulated seconds to run (default: 60)");
                println!("  -t, --tick-rate <RATE>     Ticks per second (default: 60)");
                println!("      --hit-chance <P>       Per-tick hit chance of an actor (default: 0.02)");
                println!("      --seed <SEED>          Gameplay RNG seed (default: 1)");
                println!("      --realtime             Pace ticks on the wall clock");
                println!("  -h, --help                 Show this help");
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("unknown argument: {other}");
            }
        }
        i += 1;
    }

    let loaded = match &config_path {
        Some(path) => SpawnerConfig::<LevelType>::load(path),
        None => SpawnerConfig::<LevelType>::from_toml_str(DEFAULT_CONFIG),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "cannot load spawner config");
            return ExitCode::FAILURE;
        }
    };

    let mut sim = match HordeSim::new(&config, settings) {
        Ok(sim) => sim,
        Err(err) => {
            tracing::error!(%err, "cannot start horde simulation");
            return ExitCode::FAILURE;
        }
    };

    let duration = Duration::from_secs(seconds);
    let start = Instant::now();
    if realtime {
        while sim.step().simulated_time() < duration {
            sim.advance_realtime();
        }
    } else {
        sim.advance(duration);
    }
    sim.shutdown();

    let report = sim.report();
    let timing = sim.step().stats();

    println!("┌─ HORDE REPORT ({}) ──────────────────────────────────────", settings.level);
    println!("│ Simulated:          {seconds}s in {} ticks", report.ticks);
    println!("│ Wall time:          {:.2}s", start.elapsed().as_secs_f64());
    println!("│ Avg Tick Time:      {} μs (late: {})", timing.avg_tick_us, timing.late_ticks);
    println!("│ Spawned:            {}", report.tally.spawned);
    println!("│ Killed:             {}", report.tally.killed);
    println!("│ Expired:            {}", report.tally.expired);
    println!("│ Swept at shutdown:  {}", report.tally.forced);
    println!("│ Peak active:        {}", report.peak_active);
    println!("├─ POOLS ───────────────────────────────────────────────────────");
    for stats in &report.pools {
        println!(
            "│ {:<12} available {:>3} / total {:>3} / max {:>3}",
            format!("{:?}", stats.key),
            stats.available,
            stats.total,
            stats.max_size
        );
    }
    println!("└───────────────────────────────────────────────────────────────");

    ExitCode::SUCCESS
}
