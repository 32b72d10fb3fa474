//! Junction Demo Application
//!
//! Two modes:
//! - `simulate` runs one simulated hour per scenario and prints lane statistics
//! - `live` drives an intersection on the wall clock with generated traffic
//!
//! Usage: `sim-demo [simulate|live] [config.json]`
//! Set `JUNCTION_LOG_FORMAT=json` for JSON diagnostics.

use std::time::Duration;

use junction_core::Timestamp;
use junction_log::LogQuery;
use junction_runtime::{init_tracing, Intersection, LiveDriver, LogFormat, RuntimeConfig, WallClock};
use junction_test::{IntersectionSimulator, SimulationConfig, SimulationResult, TrafficGenerator, TrafficPattern};
use tracing::info;

const LIVE_TICKS: u32 = 15;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let format = match std::env::var("JUNCTION_LOG_FORMAT") {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::Pretty,
    };
    init_tracing(format)?;

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_else(|| "simulate".to_string());
    let config = match args.next() {
        Some(path) => RuntimeConfig::from_json_file(path)?,
        None => RuntimeConfig::default(),
    };

    match mode.as_str() {
        "simulate" => simulate(&config),
        "live" => live(&config).await,
        other => Err(format!("unknown mode '{other}', expected 'simulate' or 'live'").into()),
    }
}

fn simulate(config: &RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let scenarios = [
        ("four-way", TrafficPattern::four_way()),
        ("congested", TrafficPattern::congested()),
        ("random sampling", TrafficPattern::random()),
    ];

    for (name, pattern) in scenarios {
        let sim_config = SimulationConfig {
            lanes: config.lanes.clone(),
            scheduler: config.scheduler.clone(),
            pattern,
            step: Duration::from_secs(1),
            seed: 42,
        };
        let mut sim = IntersectionSimulator::new(sim_config)?;
        let result = sim.run_for(Duration::from_secs(3600))?;
        print_result(name, &result);
    }
    Ok(())
}

fn print_result(name: &str, result: &SimulationResult) {
    println!();
    println!("== {name}: {}s simulated ==", result.elapsed.as_secs());
    println!("{:<6} {:>10} {:>12} {:>12} {:>8}", "lane", "vehicles", "green (s)", "s/vehicle", "share");
    for lane in &result.lanes {
        println!(
            "{:<6} {:>10} {:>12} {:>12.2} {:>7.1}%",
            lane.lane_id.get(),
            lane.total_vehicles,
            lane.total_green_time.as_secs(),
            lane.avg_time_per_vehicle,
            result.green_share(lane.lane_id) * 100.0,
        );
    }
    println!(
        "transitions: {}  preemptions: {}  safe: {}",
        result.transitions,
        result.preemptions,
        if result.is_safe() { "yes" } else { "NO" },
    );
}

async fn live(config: &RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (intersection, writer) = Intersection::start(config, Timestamp::now())?;

    let mut traffic = TrafficGenerator::new(&config.lanes, TrafficPattern::four_way(), 7);
    let view = intersection.clone();
    let source = move || traffic.step(&view.states());

    let driver = LiveDriver::start(intersection.clone(), config.tick_interval, WallClock, source);
    info!(interval = ?config.tick_interval, ticks = LIVE_TICKS, "driving intersection");
    tokio::time::sleep(config.tick_interval * LIVE_TICKS).await;

    let stats = driver.stop().await;
    let status = intersection.status();
    println!("{}", serde_json::to_string_pretty(&status)?);

    let history = intersection.history(&LogQuery::all())?;
    println!(
        "ticks: {}  transitions: {}  logged so far: {}",
        stats.ticks,
        stats.transitions,
        history.len()
    );

    if let Some(log_stats) = intersection.shutdown(writer).await? {
        info!(written = log_stats.written, dropped = log_stats.dropped, "transition log closed");
    }
    Ok(())
}
