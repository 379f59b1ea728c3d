use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use stepper::{logging::init_logging, step, Stepper, StepperConfig, Toggle};
use tracing::info;

/// Runs a sample three-phase workflow through the stepper
#[derive(Parser, Debug, Clone)]
#[command(name = "stepper-demo", version)]
struct Args {
    /// Run tasks in a deliberately mixed order
    #[arg(short = 's', long, action = clap::ArgAction::SetTrue)]
    scrambled: bool,

    /// Live board: auto, always or never
    #[arg(short = 'l', long)]
    live: Option<Toggle>,

    /// YAML settings file (defaults plus STEPPER_* variables otherwise)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON after the report
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,

    /// Milliseconds each task pretends to work
    #[arg(long, default_value = "300")]
    delay_ms: u64,

    /// Debug logging on stderr
    #[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

fn pause(ms: u64) {
    sleep(Duration::from_millis(ms));
}

// initialization

#[step(phase = "initialization", task = "Setup logging", order = 1.0)]
fn setup_logging(delay: u64) -> bool {
    pause(delay);
    true
}

#[step(phase = "initialization", task = "Load config file", order = 2.0)]
fn load_config(delay: u64) -> (bool, &'static str) {
    pause(delay);
    (true, "Loaded 12 settings")
}

#[step(phase = "initialization", task = "Connect to database", order = 3.0)]
fn connect_db(delay: u64) -> (bool, &'static str) {
    pause(delay);
    (false, "Connection timeout after 30 seconds")
}

// data_processing

#[step(phase = "data_processing", task = "Fetch user data", order = 1.0)]
fn fetch_users(delay: u64) {
    pause(delay);
}

#[step(phase = "data_processing", task = "Process transactions", order = 2.0)]
fn process_transactions(delay: u64) -> Result<(bool, String)> {
    pause(delay);
    let processed = (1..=512).filter(|n| n % 4 != 0).count();
    Ok((true, format!("Processed {} transactions", processed)))
}

#[step(phase = "data_processing", task = "Generate reports", order = 3.0)]
fn generate_reports(delay: u64) -> Result<bool> {
    pause(delay);
    bail!("Insufficient data for report generation")
}

// cleanup

#[step(phase = "cleanup", task = "Archive old files", order = 1.0)]
fn archive_files(delay: u64) -> bool {
    pause(delay);
    panic!("Archive directory not found: /var/logs/archive");
}

#[step(phase = "cleanup", task = "Send notifications", order = 2.0)]
fn send_notifications(delay: u64) -> bool {
    pause(delay);
    true
}

fn load_settings(args: &Args) -> Result<StepperConfig> {
    let config = match &args.config {
        Some(path) => StepperConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StepperConfig::from_env().context("reading STEPPER_* variables")?,
    };
    Ok(match args.live {
        Some(live) => config.with_live(live),
        None => config,
    })
}

/// Register every task up front so the whole plan shows before work starts
fn declare_plan(stepper: &Stepper) -> Result<()> {
    let plan = [
        setup_logging_step(stepper)?,
        load_config_step(stepper)?,
        connect_db_step(stepper)?,
        fetch_users_step(stepper)?,
        process_transactions_step(stepper)?,
        generate_reports_step(stepper)?,
        archive_files_step(stepper)?,
        send_notifications_step(stepper)?,
    ];
    for step in &plan {
        stepper.declare(step);
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    let stepper = Stepper::with_config(load_settings(&args)?)?;
    let delay = args.delay_ms;

    // panics are reported as task failures; keep the default hook quiet
    std::panic::set_hook(Box::new(|_| {}));

    stepper.reset();
    declare_plan(&stepper)?;
    stepper.start_workflow()?;
    info!(run_id = %stepper.run_id(), scrambled = args.scrambled, "demo started");

    if args.scrambled {
        archive_files(&stepper, delay);
        process_transactions(&stepper, delay);
        setup_logging(&stepper, delay);
        send_notifications(&stepper, delay);
        connect_db(&stepper, delay);
        fetch_users(&stepper, delay);
        generate_reports(&stepper, delay);
        load_config(&stepper, delay);
    } else {
        setup_logging(&stepper, delay);
        load_config(&stepper, delay);
        connect_db(&stepper, delay);
        fetch_users(&stepper, delay);
        process_transactions(&stepper, delay);
        generate_reports(&stepper, delay);
        archive_files(&stepper, delay);
        send_notifications(&stepper, delay);
    }

    let summary = stepper.summary();
    if args.json {
        println!("{}", summary.to_json()?);
    }

    if !summary.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
