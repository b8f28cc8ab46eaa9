#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a Shapeshifter scenario to completion.

mod config;
mod layout_transfer;
mod random;
mod render;

use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use shapeshifter_core::{
    Command, Event, PriorityStrategy, RoutingAlgorithm, Scenario, SimulationSettings,
    WELCOME_BANNER,
};
use shapeshifter_system_analytics::Analytics;
use shapeshifter_world::{self as world, query, World};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ScenarioFile;

const FRAME_BUDGET: Duration = Duration::from_millis(16);

/// Moves a swarm of agents into a target shape on a grid.
#[derive(Debug, Parser)]
#[command(name = "shapeshifter", version, about, long_about = None)]
struct Cli {
    /// Scenario file in TOML format.
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["layout", "random"])]
    scenario: Option<PathBuf>,

    /// Layout string produced by `--export-layout`.
    #[arg(long, value_name = "LAYOUT", conflicts_with = "random")]
    layout: Option<String>,

    /// Generate this many random destinations instead of loading a scenario.
    #[arg(long, value_name = "COUNT")]
    random: Option<usize>,

    /// Seed used by `--random`.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Grid columns used by `--random`.
    #[arg(long, default_value_t = 10)]
    columns: u32,

    /// Grid rows used by `--random`.
    #[arg(long, default_value_t = 10)]
    rows: u32,

    /// Route search strategy (astar, bfs).
    #[arg(long, value_parser = parse_routing)]
    algorithm: Option<RoutingAlgorithm>,

    /// Agent ordering within a step (manhattan, y-axis).
    #[arg(long, value_parser = parse_priority)]
    priority: Option<PriorityStrategy>,

    /// Allow diagonal moves.
    #[arg(long)]
    diagonals: bool,

    /// Simulated milliseconds between two steps.
    #[arg(long, value_name = "MS")]
    step_interval_ms: Option<u64>,

    /// Escalations without progress before an agent counts as stalled.
    #[arg(long)]
    stall_threshold: Option<u32>,

    /// Keep each agent on the destination listed at the same index.
    #[arg(long)]
    preassigned: bool,

    /// Stop after this many steps even if agents are still moving.
    #[arg(long, default_value_t = 500)]
    max_steps: u64,

    /// Advance on wall-clock time instead of as fast as possible.
    #[arg(long)]
    realtime: bool,

    /// Print the grid after every step.
    #[arg(long)]
    frames: bool,

    /// Print the scenario as a layout string and exit.
    #[arg(long)]
    export_layout: bool,

    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "shapeshifter=info")]
    log_filter: String,
}

fn parse_routing(value: &str) -> Result<RoutingAlgorithm, String> {
    value.parse().map_err(|error| format!("{error}"))
}

fn parse_priority(value: &str) -> Result<PriorityStrategy, String> {
    value.parse().map_err(|error| format!("{error}"))
}

/// Entry point for the Shapeshifter command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_filter)?;
    info!("{WELCOME_BANNER}");

    let (scenario, settings) = load(&cli)?;

    if cli.export_layout {
        println!("{}", layout_transfer::encode(&scenario)?);
        return Ok(());
    }

    let world = if cli.preassigned {
        World::preassigned(scenario, settings)
    } else {
        World::new(scenario, settings)
    }
    .context("scenario rejected")?;

    run(world, &cli)
}

fn init_logging(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

/// Resolves the scenario source and layers command-line overrides on top.
fn load(cli: &Cli) -> Result<(Scenario, SimulationSettings)> {
    let (scenario, mut settings) = if let Some(path) = &cli.scenario {
        let file = ScenarioFile::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let settings = file.simulation.to_settings()?;
        (file.scenario(), settings)
    } else if let Some(layout) = &cli.layout {
        let scenario = layout_transfer::decode(layout).context("invalid layout string")?;
        (scenario, SimulationSettings::default())
    } else if let Some(count) = cli.random {
        let destinations = random::destinations(cli.columns, cli.rows, count, &[], cli.seed)?;
        let scenario = Scenario::with_fixed_origins(cli.columns, cli.rows, destinations, Vec::new());
        (scenario, SimulationSettings::default())
    } else {
        bail!("one of --scenario, --layout or --random is required");
    };

    if let Some(algorithm) = cli.algorithm {
        settings.routing = algorithm;
    }
    if let Some(priority) = cli.priority {
        settings.priority = priority;
    }
    if cli.diagonals {
        settings.diagonal_moves = true;
    }
    if let Some(milliseconds) = cli.step_interval_ms {
        settings.step_interval = Duration::from_millis(milliseconds);
    }
    if let Some(threshold) = cli.stall_threshold {
        settings.stall_threshold = threshold;
    }

    Ok((scenario, settings))
}

fn run(mut world: World, cli: &Cli) -> Result<()> {
    let mut analytics = Analytics::new();
    let progress = query::progress(&world);
    info!(
        agents = progress.total(),
        cost = query::assignment_cost(&world),
        "scenario ready"
    );
    if cli.frames {
        println!("{}\n", frame(&world));
    }

    let mut events = Vec::new();
    let mut last_frame = Instant::now();
    while !query::is_complete(&world) && query::step_index(&world) < cli.max_steps {
        events.clear();
        if cli.realtime {
            thread::sleep(FRAME_BUDGET);
            let now = Instant::now();
            world::apply(
                &mut world,
                Command::Tick {
                    dt: now - last_frame,
                },
                &mut events,
            );
            last_frame = now;
        } else {
            world::apply(&mut world, Command::Step, &mut events);
        }
        analytics.handle(&events);

        for event in &events {
            match event {
                Event::StepCompleted { step, progress } => {
                    info!(step, %progress, "step");
                    if cli.frames {
                        println!("{}\n", frame(&world));
                    }
                }
                Event::AgentStalled {
                    agent_id,
                    escalations,
                } => warn!(agent = %agent_id, escalations, "agent is not making progress"),
                _ => {}
            }
        }
    }

    let report = analytics.report();
    if !query::is_complete(&world) {
        warn!(
            steps = query::step_index(&world),
            progress = %query::progress(&world),
            stalled = analytics.stalled_agents().count(),
            "stopped before every agent arrived"
        );
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("steps:         {}", report.steps);
        println!("arrived:       {}", query::progress(&world));
        println!("moves:         {}", report.advances);
        println!("waits:         {}", report.waits);
        println!("replans:       {}", report.replans);
        println!("reroutes:      {}", report.reroutes);
        println!("plan failures: {}", report.plan_failures);
        println!("stalled:       {}", report.stalls);
        println!("overlaps:      {}", report.overlaps);
        if let Some(ratio) = report.moves_per_arrival() {
            println!("moves/agent:   {ratio:.2}");
        }
    }

    Ok(())
}

fn frame(world: &World) -> String {
    render::frame(
        query::grid(world),
        &query::agent_view(world),
        query::step_index(world),
    )
}
