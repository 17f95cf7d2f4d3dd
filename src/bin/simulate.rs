//! Boss encounter simulator CLI.
//!
//! Run Monte Carlo simulations of a scenario file and tune boss HP.
//!
//! Usage:
//!   cargo run --bin simulate -- <COMMAND> <SCENARIO> [OPTIONS]
//!
//! Examples:
//!   cargo run --bin simulate -- run scenarios/drake.json
//!   cargo run --bin simulate -- run scenarios/drake.json -n 2000 --seed 42
//!   cargo run --bin simulate -- tune scenarios/drake.json --target 4
//!   cargo run --bin simulate -- damage scenarios/drake.json --pc Wizard --rounds 3

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scales::simulator::{
    boss_time_to_defeat, incoming_damage, run_simulation, simulate_damage_taken, Scenario,
    ScenarioFile,
};
use scales::tuner::tune;
use std::path::PathBuf;

/// Monte Carlo boss encounter simulator
#[derive(Parser)]
#[command(name = "simulate")]
#[command(about = "Simulate boss encounters and tune boss HP", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate the encounter and report TTK, lethality and guardrails
    Run(RunArgs),

    /// Search boss HP for a target median TTK
    Tune(TuneArgs),

    /// Closed-form incoming DPR and boss time-to-defeat
    Estimate(ScenarioArgs),

    /// Damage one PC takes over a few rounds
    Damage(DamageArgs),
}

#[derive(Args)]
struct ScenarioArgs {
    /// Scenario JSON file
    scenario: PathBuf,

    /// Emit JSON instead of the text report
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SimArgs {
    /// Number of trials
    #[arg(short = 'n', long)]
    trials: Option<u32>,

    /// Rounds before a trial counts as a non-kill
    #[arg(short = 'r', long)]
    max_rounds: Option<u32>,

    /// Base random seed
    #[arg(short, long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[command(flatten)]
    sim: SimArgs,

    /// Override the boss's max HP
    #[arg(long)]
    boss_hp: Option<f64>,
}

#[derive(Args)]
struct TuneArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[command(flatten)]
    sim: SimArgs,

    /// Target median TTK in rounds
    #[arg(long)]
    target: Option<f64>,

    /// Highest acceptable TPK probability
    #[arg(long)]
    tpk_cap: Option<f64>,
}

#[derive(Args)]
struct DamageArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Party member to track
    #[arg(long)]
    pc: String,

    /// Rounds of boss offense
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Number of trials
    #[arg(short = 'n', long, default_value_t = 20_000)]
    trials: u32,

    /// Base random seed
    #[arg(short, long)]
    seed: Option<u64>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load, apply command-line overrides, then validate.
fn load(args: &ScenarioArgs, sim: Option<&SimArgs>) -> Result<Scenario> {
    let mut file = ScenarioFile::read(&args.scenario)?;
    if let Some(sim) = sim {
        if let Some(trials) = sim.trials {
            file.sim.trials = trials;
        }
        if let Some(max_rounds) = sim.max_rounds {
            file.sim.max_rounds = max_rounds;
        }
        if sim.seed.is_some() {
            file.sim.seed = sim.seed;
        }
    }
    file.validate()
        .with_context(|| format!("invalid scenario {}", args.scenario.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            let mut scenario = load(&args.scenario, Some(&args.sim))?;
            if let Some(hp) = args.boss_hp {
                anyhow::ensure!(
                    hp.is_finite() && hp > 0.0,
                    "--boss-hp must be a positive number, got {hp}"
                );
                scenario.encounter = scenario.encounter.with_boss_hp(hp);
            }
            let result = run_simulation(&scenario.encounter, &scenario.sim, None)?;
            if args.scenario.json {
                println!("{}", result.to_json());
            } else {
                println!("{}", result.to_text());
            }
        }
        Command::Tune(args) => {
            let mut scenario = load(&args.scenario, Some(&args.sim))?;
            if let Some(target) = args.target {
                scenario.tune.target_median = target;
            }
            if let Some(cap) = args.tpk_cap {
                scenario.tune.tpk_cap = cap;
            }
            let report = tune(&scenario.encounter, &scenario.sim, &scenario.tune, None)?;
            if args.scenario.json {
                println!("{}", report.to_json());
            } else {
                println!("{}", report.to_text());
            }
        }
        Command::Estimate(args) => {
            let scenario = load(&args, None)?;
            let incoming = incoming_damage(&scenario.encounter);
            let boss = boss_time_to_defeat(&scenario.encounter);
            if args.json {
                let json = serde_json::json!({ "incoming": incoming, "boss": boss });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("── INCOMING DAMAGE ──────────────────────────────────────────────");
                for pc in &incoming {
                    let rounds = pc
                        .rounds_to_zero
                        .map_or("never".to_string(), |r| format!("{:.1} rounds", r));
                    println!(
                        "  {:<12} {:>6.1} DPR vs {:>4} HP -> down in {}",
                        pc.name, pc.incoming_dpr, pc.max_hp, rounds
                    );
                }
                println!();
                println!("── BOSS ─────────────────────────────────────────────────────────");
                println!("  Party DPR:        {:.1}", boss.party_dpr);
                println!("  Net DPR:          {:.1}", boss.net_dpr);
                match boss.rounds_to_defeat {
                    Some(r) => println!("  Rounds to defeat: {:.1}", r),
                    None => println!("  Rounds to defeat: never (regeneration outpaces damage)"),
                }
            }
        }
        Command::Damage(args) => {
            let scenario = load(&args.scenario, None)?;
            let seed = args.seed.or(scenario.sim.seed).unwrap_or_else(rand::random);
            let taken =
                simulate_damage_taken(&scenario.encounter, &args.pc, args.rounds, args.trials, seed)?;
            if args.scenario.json {
                println!("{}", serde_json::to_string_pretty(&taken)?);
            } else {
                println!(
                    "{} over {} rounds ({} trials): mean {:.1}, p95 {:.1}, p99 {:.1}, lethal {:.1}%",
                    taken.name,
                    taken.rounds,
                    taken.trials,
                    taken.mean,
                    taken.p95,
                    taken.p99,
                    taken.lethal_prob * 100.0
                );
            }
        }
    }

    Ok(())
}
