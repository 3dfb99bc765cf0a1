//! Fleet apply example
//!
//! Loads an inventory and a rendered configuration file, probes every device
//! and pushes the configuration to the ones that answer. Ctrl+C stops the
//! run after the device in progress.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example apply -- --inventory inventory/devices.yml --config rendered/core.cfg
//! ```
//!
//! Probe only, or show what would be sent:
//! ```bash
//! cargo run --example apply -- --inventory inventory/devices.yml --config rendered/core.cfg --mode check
//! cargo run --example apply -- --inventory inventory/devices.yml --config rendered/core.cfg --mode plan
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use netpush::{
    ConfigCommandList, DriverRegistry, FleetJob, FleetMode, FleetOptions, FleetRunner, Inventory,
    SessionOrchestrator, SshConnector, TimingPolicy,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("=== netpush apply ===\n");

    let inventory = Inventory::load(&args.inventory)?;
    let report = inventory.validate();
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    let devices = match &args.device {
        Some(name) => vec![inventory.get(name)?],
        None => inventory.devices()?,
    };

    let rendered = std::fs::read_to_string(&args.config)?;
    let commands = ConfigCommandList::from_rendered(&rendered);
    println!(
        "{} device(s), {} configuration line(s), mode {:?}\n",
        devices.len(),
        commands.len(),
        args.mode
    );

    let mut registry = DriverRegistry::builtin(TimingPolicy::default())?;
    if let Some(path) = &args.syntax {
        let replaced = registry.load_overrides(path)?;
        println!("{} syntax table(s) overridden from {}", replaced, path.display());
    }

    let options = FleetOptions {
        mode: args.mode,
        ..FleetOptions::default()
    };
    let interrupt = options.interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupt received, stopping after the current device");
            interrupt.interrupt();
        }
    });

    let orchestrator = SessionOrchestrator::new(Arc::new(registry), SshConnector);
    let runner = FleetRunner::new(orchestrator, options);

    let jobs: Vec<FleetJob> = devices
        .into_iter()
        .map(|device| FleetJob::new(device, commands.clone()))
        .collect();
    let summary = runner.run(&jobs).await;

    println!("\n=== Summary ===");
    for outcome in &summary.outcomes {
        let status = if outcome.success { "OK" } else { "FAILED" };
        print!("{:<20} {:<7} {:>6.1}s", outcome.device, status, outcome.elapsed.as_secs_f64());
        if let Some(planned) = outcome.planned {
            print!("  {} line(s) planned", planned);
        }
        if let Some(error) = &outcome.error {
            print!("  {}", error);
        }
        println!();

        if args.verbose {
            if let Some(result) = &outcome.result {
                for entry in &result.transcript {
                    println!("    [{}] {:?} {:?}: {:?}", entry.state, entry.step, entry.command, entry.outcome);
                }
                for note in &result.notes {
                    println!("    {:?}: {}", note.level, note.message);
                }
            }
        }
    }
    for name in &summary.skipped {
        println!("{:<20} SKIPPED", name);
    }
    println!(
        "\n{} succeeded, {} failed, {} skipped",
        summary.succeeded().count(),
        summary.failed().count(),
        summary.skipped.len()
    );

    if summary.all_succeeded() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

const USAGE: &str = "Usage: apply [OPTIONS]
  -i, --inventory <PATH>  Inventory YAML (default: inventory/devices.yml)
  -c, --config <PATH>     Rendered configuration file
  -s, --syntax <PATH>     Vendor syntax overrides (YAML)
  -d, --device <NAME>     Only this device
  -m, --mode <MODE>       check | plan | apply (default: apply)
  -v, --verbose           Print transcripts";

fn usage_error(message: &str) -> ! {
    eprintln!("error: {}\n\n{}", message, USAGE);
    std::process::exit(2);
}

struct Args {
    inventory: PathBuf,
    config: PathBuf,
    syntax: Option<PathBuf>,
    device: Option<String>,
    mode: FleetMode,
    verbose: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut inventory = PathBuf::from("inventory/devices.yml");
        let mut config = PathBuf::from("rendered.cfg");
        let mut syntax = None;
        let mut device = None;
        let mut mode = FleetMode::Apply;
        let mut verbose = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--inventory" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        inventory = PathBuf::from(&args[i]);
                    }
                }
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = PathBuf::from(&args[i]);
                    }
                }
                "--syntax" | "-s" => {
                    i += 1;
                    if i < args.len() {
                        syntax = Some(PathBuf::from(&args[i]));
                    }
                }
                "--device" | "-d" => {
                    i += 1;
                    if i < args.len() {
                        device = Some(args[i].clone());
                    }
                }
                "--mode" | "-m" => {
                    i += 1;
                    let value = args.get(i).map(String::as_str).unwrap_or_default();
                    mode = match value.parse() {
                        Ok(mode) => mode,
                        Err(e) => usage_error(&e.to_string()),
                    };
                }
                "--verbose" | "-v" => verbose = true,
                "--help" => {
                    println!("{}", USAGE);
                    std::process::exit(0);
                }
                other => usage_error(&format!("unknown option '{}'", other)),
            }
            i += 1;
        }

        Self {
            inventory,
            config,
            syntax,
            device,
            mode,
            verbose,
        }
    }
}
