//! Modeswitch CLI - inspect and dry-run mode controller topologies.
//!
//! This is the entry point for the `modeswitch` binary.

mod render;
mod sim;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use modeswitch_control::{ControllerConfig, TopologyConfig, TransitionPlan};
use modeswitch_core::Mode;
use tracing_subscriber::EnvFilter;

use sim::Simulation;

/// Modeswitch CLI - inspect and dry-run mode controller topologies.
#[derive(Parser, Debug)]
#[command(name = "modeswitch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON topology file. The server default topology is used when omitted.
    #[arg(long, global = true, env = "MODESWITCH_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the topology is well formed and print its tiers.
    Validate,

    /// Print the ordered tier actions for a mode change.
    Plan {
        /// Current mode. Omit to plan the first transition after boot.
        #[arg(long)]
        from: Option<Mode>,

        /// Target mode.
        #[arg(long)]
        to: Mode,

        /// Emit the plan as JSON.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run a real controller over logging stand-in components.
    Simulate {
        /// Modes to apply in order. Falls back to `MODESWITCH_STATIC_MODE`.
        modes: Vec<Mode>,

        /// Artificial latency of each component call, in milliseconds.
        #[arg(long, default_value = "0")]
        delay_ms: u64,

        /// Keep the last mode until Ctrl-C instead of shutting down.
        #[arg(long, default_value = "false")]
        hold: bool,

        /// Emit the timeline as JSON.
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "info,modeswitch=debug,modeswitch_control=debug"
    } else {
        "warn,modeswitch=info,modeswitch_control=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ControllerConfig::from_env();
    if args.topology.is_some() {
        config.topology_path = args.topology;
    }
    let topology = config.load_topology()?;
    topology.validate()?;

    match args.command {
        Command::Validate => validate(&topology),
        Command::Plan { from, to, json } => plan(&topology, from, to, json)?,
        Command::Simulate {
            modes,
            delay_ms,
            hold,
            json,
        } => {
            let simulation = Simulation {
                modes,
                static_mode: config.static_mode,
                delay: Duration::from_millis(delay_ms),
                update_buffer: config.update_buffer,
                hold,
            };
            let timeline = sim::run(&topology, &simulation).await?;
            let events = timeline.events();
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                for line in render::timeline_lines(&events) {
                    println!("{line}");
                }
            }
        }
    }

    Ok(())
}

fn validate(topology: &TopologyConfig) {
    println!(
        "topology ok: {} tiers, {} components",
        topology.tiers.len(),
        topology.component_names().count()
    );
    for (i, tier) in topology.tiers.iter().enumerate() {
        let modes: Vec<&str> = tier.live_modes.iter().map(Mode::as_str).collect();
        println!(
            "{}. {} [{}] ({})",
            i + 1,
            tier.name,
            modes.join(", "),
            tier.components.join(", ")
        );
    }
}

fn plan(topology: &TopologyConfig, from: Option<Mode>, to: Mode, json: bool) -> anyhow::Result<()> {
    let plan = TransitionPlan::for_topology(topology, from, to);
    let steps = render::resolve(topology, &plan);
    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        for line in render::plan_lines(&steps) {
            println!("{line}");
        }
    }
    Ok(())
}
