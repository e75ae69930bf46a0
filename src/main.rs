use std::{
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};

use tremor_watch::{
    classifier::{classify, LabelPolicy},
    collector::Collector,
    config::{DetectorConfig, DEFAULT_COLLECTOR_BIND},
    detector::Detector,
    logging,
    report::{HttpTransport, Reporter, TremorReport},
    sensor::{parse_trace, MotionSensor, ReplaySensor, SyntheticSensor},
};

const STATUS_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "tremor-watch")]
#[command(about = "Tremor intensity detector and report collector")]
struct Cli {
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: LevelFilter,
    /// Append every log record as a JSON line to this file.
    #[arg(long = "log-json", global = true)]
    log_json: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunArgs),
    Classify(ClassifyArgs),
    Report(ReportArgs),
    Collect(CollectArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    endpoint: Option<String>,
    /// Replay a recorded `x,y,z` trace instead of the synthetic sensor.
    #[arg(long, conflicts_with_all = ["synthetic_amplitude", "synthetic_frequency_hz"])]
    trace: Option<PathBuf>,
    #[arg(long = "synthetic-amplitude", default_value_t = 0.6)]
    synthetic_amplitude: f64,
    #[arg(long = "synthetic-frequency-hz", default_value_t = 5.0)]
    synthetic_frequency_hz: f64,
    #[arg(long = "label-policy", value_parser = LabelPolicy::parse)]
    label_policy: Option<LabelPolicy>,
    #[arg(long = "sample-interval-ms")]
    sample_interval_ms: Option<u64>,
    #[arg(long = "report-interval-ms")]
    report_interval_ms: Option<u64>,
    /// Must not exceed the report interval.
    #[arg(long = "request-timeout-sec")]
    request_timeout_sec: Option<f64>,
    /// Stop after this many seconds; runs until killed when omitted.
    #[arg(long = "duration-secs")]
    duration_secs: Option<u64>,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    trace: PathBuf,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    intensity: u8,
    #[arg(long)]
    situation: String,
}

#[derive(Debug, Args)]
struct CollectArgs {
    #[arg(long, default_value = DEFAULT_COLLECTOR_BIND)]
    bind: String,
}

fn run(cli: Cli) -> Result<()> {
    logging::init(cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Run(args) => run_detector(args),
        Commands::Classify(args) => run_classify(args),
        Commands::Report(args) => run_report(args),
        Commands::Collect(args) => Collector::bind(&args.bind)
            .with_context(|| format!("cannot listen on {}", args.bind))?
            .run(),
    }
}

fn run_detector(args: RunArgs) -> Result<()> {
    let mut config = DetectorConfig::load(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(policy) = args.label_policy {
        config.label_policy = policy;
    }
    if let Some(ms) = args.sample_interval_ms {
        config.sample_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = args.report_interval_ms {
        config.report_interval = Duration::from_millis(ms);
    }
    if let Some(sec) = args.request_timeout_sec {
        config.request_timeout = Duration::try_from_secs_f64(sec)
            .map_err(|err| anyhow!("--request-timeout-sec invalid: {err}"))?;
    }
    config.validate()?;

    let sensor: Box<dyn MotionSensor> = match args.trace {
        Some(path) => Box::new(ReplaySensor::from_path(&path)?),
        None => Box::new(SyntheticSensor::new(
            args.synthetic_amplitude,
            args.synthetic_frequency_hz,
        )),
    };

    let mut detector = Detector::connect(&config, sensor)?;
    detector.start()?;

    let deadline = args
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    while deadline.is_none_or(|deadline| Instant::now() < deadline) {
        thread::sleep(STATUS_PERIOD);
        let status = detector.status();
        info!(
            "status: phase={} intensity={} situation={:?}",
            status.phase.as_str(),
            status.state.intensity(),
            status.state.situation
        );
    }

    detector.stop();
    Ok(())
}

fn run_classify(args: ClassifyArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.trace)
        .with_context(|| format!("failed to read trace {}", args.trace.display()))?;
    let samples = parse_trace(&text)
        .map_err(|err| anyhow!("invalid trace {}: {err}", args.trace.display()))?;

    println!("index,magnitude,intensity,label");
    for (idx, sample) in samples.iter().enumerate() {
        let magnitude = sample.magnitude();
        let level = classify(magnitude);
        println!("{idx},{magnitude:.4},{},{}", level.as_u8(), level.label());
    }
    Ok(())
}

fn run_report(args: ReportArgs) -> Result<()> {
    let mut config = DetectorConfig::load(None)?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    config.validate()?;
    if args.intensity > 4 {
        bail!("intensity must be within 0..=4, got {}", args.intensity);
    }

    let transport = HttpTransport::new(config.request_timeout, config.connect_timeout)?;
    let reporter = Reporter::new(&config.endpoint, Arc::new(transport));
    let outcome = reporter.deliver(&TremorReport {
        intensity: args.intensity,
        situation: args.situation,
    });
    if !outcome.is_delivered() {
        bail!("report to {} failed: {outcome}", reporter.url());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
