use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use groupsum::{
    run_reduction_pipeline, BackendKind, ComputeBackend, DevicePreference, HostBackend,
    InputVector, PipelineConfig, PipelineOutcome,
};

#[derive(Parser)]
#[command(name = "groupsum", version, about = "Work-group summation with host validation")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reduce a generated input on a device and compare against host references
    Run(RunArgs),
    /// List the devices a backend can see
    Devices {
        #[arg(long, value_enum, default_value_t = Backend::Host)]
        backend: Backend,
    },
}

#[derive(Args)]
struct RunArgs {
    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    elements: Option<usize>,

    #[arg(long)]
    group_size: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Select the first device instead of preferring a GPU
    #[arg(long)]
    first_device: bool,

    /// Accepted relative difference from the grouped Kahan reference
    #[arg(long)]
    tolerance: Option<f64>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Host,
    Opencl,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Host => BackendKind::Host,
            Backend::Opencl => BackendKind::OpenCl,
        }
    }
}

impl RunArgs {
    fn into_config(self) -> anyhow::Result<(PipelineConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => PipelineConfig::default(),
        };
        if let Some(n) = self.elements {
            config.element_count = n;
        }
        if let Some(g) = self.group_size {
            config.group_size = g;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
        if self.first_device {
            config.device_preference = DevicePreference::First;
        }
        if let Some(t) = self.tolerance {
            config.relative_tolerance = t;
        }
        Ok((config, self.json))
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => {
            let (config, json) = args.into_config()?;
            run(&config, json)
        }
        Command::Devices { backend } => {
            devices(backend.into())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(config: &PipelineConfig, json: bool) -> anyhow::Result<ExitCode> {
    // Fail on a bad layout before spending time on input generation.
    config.layout()?;
    let input = InputVector::uniform(config.element_count, config.seed);
    info!(elements = input.len(), seed = config.seed, "input generated");

    match config.backend {
        BackendKind::Host => {
            let mut backend = HostBackend::new();
            run_on(&mut backend, &input, config, json)
        }
        BackendKind::OpenCl => run_opencl(&input, config, json),
    }
}

#[cfg(feature = "opencl")]
fn run_opencl(input: &InputVector, config: &PipelineConfig, json: bool) -> anyhow::Result<ExitCode> {
    let mut backend = groupsum::OpenClBackend::new(config.device_preference)?;
    run_on(&mut backend, input, config, json)
}

#[cfg(not(feature = "opencl"))]
fn run_opencl(_: &InputVector, _: &PipelineConfig, _: bool) -> anyhow::Result<ExitCode> {
    bail!("the OpenCL backend is not built in; rebuild with --features opencl")
}

fn run_on<B: ComputeBackend>(
    backend: &mut B,
    input: &InputVector,
    config: &PipelineConfig,
    json: bool,
) -> anyhow::Result<ExitCode> {
    if !json {
        println!("{}", backend.device());
    }
    let outcome = run_reduction_pipeline(backend, input, config.group_size)?;
    let accepted = outcome
        .report()
        .map(|r| r.agrees_with_kahan_grouped(config.relative_tolerance))
        .unwrap_or(false);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome, config))?);
    } else {
        print_outcome(&outcome, config, accepted);
    }

    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn outcome_json(outcome: &PipelineOutcome, config: &PipelineConfig) -> serde_json::Value {
    serde_json::json!({
        "config": config,
        "references": outcome.references,
        "report": outcome.report(),
        "accepted": outcome
            .report()
            .map(|r| r.agrees_with_kahan_grouped(config.relative_tolerance)),
        "deviceError": outcome.device_error().map(|e| e.to_string()),
    })
}

fn print_outcome(outcome: &PipelineOutcome, config: &PipelineConfig, accepted: bool) {
    match outcome.report() {
        Some(report) => {
            print!("{}", report);
            let d = report.device_vs_kahan_grouped();
            println!();
            println!(
                "{}: device sum within {:.3e} of grouped kahan reference (tolerance {:.3e})",
                if accepted { "PASS" } else { "FAIL" },
                d.relative,
                config.relative_tolerance
            );
        }
        None => {
            for (label, value) in outcome.references.labelled() {
                println!("Sum of all numbers ({}) = {:.6}", label, value);
            }
            if let Some(e) = outcome.device_error() {
                println!("FAIL: {}", e);
            }
        }
    }
}

fn devices(kind: BackendKind) -> anyhow::Result<()> {
    let devices = match kind {
        BackendKind::Host => HostBackend::new().enumerate_devices()?,
        BackendKind::OpenCl => probe_opencl()?,
    };
    if devices.is_empty() {
        bail!("no devices found");
    }
    for (i, device) in devices.iter().enumerate() {
        println!("[{}] {}", i, device);
    }
    Ok(())
}

#[cfg(feature = "opencl")]
fn probe_opencl() -> anyhow::Result<Vec<groupsum::DeviceInfo>> {
    Ok(groupsum::device::opencl::probe_devices()?)
}

#[cfg(not(feature = "opencl"))]
fn probe_opencl() -> anyhow::Result<Vec<groupsum::DeviceInfo>> {
    bail!("the OpenCL backend is not built in; rebuild with --features opencl")
}
