use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use road_traffic_sim::ini::Ini;
use road_traffic_sim::simulation::{
    Notification, SimulationStats, Sink, Stepper, TrafficSimulator, CHECK_TICKS, DEFAULT_TICKS,
    EVENT_PARSERS,
};

#[derive(Parser)]
#[command(name = "road_traffic_sim")]
#[command(about = "Discrete-event road traffic simulator")]
struct Cli {
    /// Events file to load
    #[arg(short, long, env = "TRAFFIC_INPUT")]
    input: Option<PathBuf>,

    /// Where to write the per-tick reports (stdout when absent)
    #[arg(short, long, env = "TRAFFIC_OUTPUT")]
    output: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(short, long, env = "TRAFFIC_TICKS", default_value_t = DEFAULT_TICKS)]
    ticks: u32,

    /// Pause between ticks in milliseconds; non-zero runs on a background stepper
    #[arg(long, env = "TRAFFIC_DELAY_MS", default_value_t = 0)]
    delay_ms: u64,

    /// Print every junction, road and vehicle after the run
    #[arg(long)]
    summary: bool,

    /// Print an empty section for every supported event and exit
    #[arg(long)]
    templates: bool,

    /// Run every *.ini file in DIR and compare with its .ini.eout
    #[arg(long, value_name = "DIR")]
    check: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,road_traffic_sim=info"),
    )
    .init();

    let cli = Cli::parse();

    if cli.templates {
        print_templates();
        return Ok(());
    }
    if let Some(dir) = &cli.check {
        return run_checks(dir);
    }

    let Some(input) = cli.input.as_deref() else {
        bail!("no events file given, use --input <FILE>");
    };
    run_batch(&cli, input)
}

fn print_templates() {
    for parser in EVENT_PARSERS {
        println!("; {}", parser.name());
        println!("{}", parser.template());
    }
}

fn load(simulator: &mut TrafficSimulator, input: &Path) -> Result<usize> {
    let file =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    simulator
        .load_events(BufReader::new(file))
        .with_context(|| format!("failed to load events from {}", input.display()))
}

fn open_sink(output: Option<&Path>) -> Result<Sink> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    })
}

/// Loads the events and runs the requested ticks
fn run_batch(cli: &Cli, input: &Path) -> Result<()> {
    let mut simulator = TrafficSimulator::new();
    let count = load(&mut simulator, input)?;
    info!("Loaded {} events from {}", count, input.display());

    let mut sink = open_sink(cli.output.as_deref())?;

    let simulator = if cli.delay_ms > 0 {
        let notifications = simulator.subscribe();
        let stepper = Stepper::start(
            simulator,
            cli.ticks,
            Duration::from_millis(cli.delay_ms),
            Some(sink),
        );
        while !stepper.is_finished() {
            if let Ok(Notification::Advanced { time }) =
                notifications.recv_timeout(Duration::from_millis(100))
            {
                info!("Reached tick {}", time);
            }
        }
        let (simulator, ran) = stepper.join()?;
        if ran < cli.ticks {
            bail!("simulation stopped after {} of {} ticks", ran, cli.ticks);
        }
        simulator
    } else {
        simulator
            .run(cli.ticks, Some(&mut *sink))
            .context("simulation aborted")?;
        sink.flush().context("failed to flush the reports")?;
        simulator
    };

    if cli.summary {
        print_summary(&simulator);
    }
    SimulationStats::collect(&simulator).log();
    Ok(())
}

fn print_table(title: &str, rows: Vec<Vec<(&'static str, String)>>) {
    println!("--- {} ---", title);
    for row in rows {
        let cells: Vec<String> = row
            .into_iter()
            .map(|(column, value)| format!("{}={}", column, value))
            .collect();
        println!("  {}", cells.join(" "));
    }
}

fn print_summary(simulator: &TrafficSimulator) {
    let map = simulator.road_map();
    println!("=== Traffic Simulation Summary ===");
    println!("Time: {}", simulator.time());
    print_table(
        "Events",
        simulator.events().iter().map(|e| e.describe()).collect(),
    );
    print_table("Junctions", map.junctions().map(|j| j.describe()).collect());
    print_table("Roads", map.roads().map(|r| r.describe()).collect());
    print_table("Vehicles", map.vehicles().map(|v| v.describe()).collect());
}

/// Regression mode: each `name.ini` runs for a fixed number of ticks into
/// `name.ini.out`, which must equal `name.ini.eout`
fn run_checks(dir: &Path) -> Result<()> {
    let mut inputs: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "ini"))
        .collect();
    inputs.sort();

    let mut checked = 0;
    let mut failed = 0;
    for input in &inputs {
        let expected = input.with_extension("ini.eout");
        if !expected.exists() {
            println!("{}: no expected output, skipped", input.display());
            continue;
        }
        checked += 1;
        let output = input.with_extension("ini.out");
        match check_one(input, &output, &expected) {
            Ok(true) => println!("{}: OK", input.display()),
            Ok(false) => {
                failed += 1;
                println!("{}: output differs from {}", input.display(), expected.display());
            }
            Err(err) => {
                failed += 1;
                warn!("{}: {:#}", input.display(), err);
                println!("{}: FAILED ({:#})", input.display(), err);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} checks failed", failed, checked);
    }
    info!("{} checks passed", checked);
    Ok(())
}

fn check_one(input: &Path, output: &Path, expected: &Path) -> Result<bool> {
    let mut simulator = TrafficSimulator::new();
    load(&mut simulator, input)?;
    {
        let mut sink = open_sink(Some(output))?;
        simulator.run(CHECK_TICKS, Some(&mut *sink))?;
        sink.flush()?;
    }

    let read = |path: &Path| -> Result<Ini> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Ini::load(BufReader::new(file))?)
    };
    Ok(read(output)? == read(expected)?)
}
