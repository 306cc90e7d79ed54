//! obstacle-node - simulated obstacle-detection node
//!
//! Usage: obstacle-node [config.json] [ticks]
//!
//! Without a config file the stock four-sensor node is used. Without a tick
//! count it runs until killed.

use coop_rtos::config::NodeConfig;
use coop_rtos::console;
use coop_rtos::firmware::Node;
use coop_rtos::kernel::clock::{ClockRef, SystemClock};
use std::process;
use std::rc::Rc;
use std::time::Duration;

struct Args {
    config: Option<String>,
    ticks: Option<u64>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        ticks: None,
    };
    for arg in std::env::args().skip(1) {
        if arg == "-h" || arg == "--help" {
            println!("usage: obstacle-node [config.json] [ticks]");
            process::exit(0);
        }
        if let Ok(n) = arg.parse::<u64>() {
            args.ticks = Some(n);
        } else if args.config.is_none() {
            args.config = Some(arg);
        } else {
            return Err(format!("unexpected argument '{}'", arg));
        }
    }
    Ok(args)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    console::init(&config.log_level)?;
    log::info!(
        "obstacle-node: {} sensors, tick every {}ms",
        config.sensors.len(),
        config.tick_interval_ms
    );

    let clock: ClockRef = Rc::new(SystemClock::new());
    let (mut node, handles) = Node::simulated(&config, clock)?;
    let interval = Duration::from_millis(config.tick_interval_ms);

    let mut ticks = 0u64;
    while args.ticks.is_none_or(|limit| ticks < limit) {
        node.tick();
        ticks += 1;
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    let stats = node.scheduler().stats();
    log::info!("stats: {}", serde_json::to_string(stats)?);
    log::info!("tasks: {}", serde_json::to_string(&node.scheduler().snapshot())?);
    log::info!(
        "uploads: {}, watchdog feeds: {}, utilization {:.1}%",
        handles.uploads.borrow().len(),
        handles.watchdog_feeds.get(),
        stats.utilization() * 100.0
    );
    Ok(())
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("obstacle-node: {}", e);
            process::exit(2);
        }
    };
    if let Err(e) = run(args) {
        eprintln!("obstacle-node: {}", e);
        process::exit(1);
    }
}
