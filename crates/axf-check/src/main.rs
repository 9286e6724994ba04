use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use axf_cert::{
    certify, Acceptance, CertificationReport, CertifyConfig, CheckLevel, CheckStrategy,
    ExitStatus, SvgHistogram, TextHistogram, Visualizer,
};
use axf_core::errors::AxfError;
use axf_import::import_file_with_hash;
use axf_norm::SampledNormEvaluator;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit code for runs aborted before a verdict (unreadable input, bad configuration).
const FATAL_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "axf-check",
    version,
    about = "Certify the error bounds recorded in an AXF approximation report"
)]
struct Cli {
    /// AXF JSON report to certify.
    filename: PathBuf,
    /// `light` checks bound composition; `strong` also recomputes every bound.
    #[arg(long, value_enum)]
    check_level: Option<LevelArg>,
    /// Stop at the first violation.
    #[arg(long)]
    exit_on_error: bool,
    /// Render a log-scale histogram of sub-approximation errors per top-level.
    #[arg(long)]
    error_hist: bool,
    /// YAML policy file; command line flags override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Working precision in bits for bounds that do not record one.
    #[arg(long, value_name = "BITS")]
    precision: Option<u32>,
    /// Sample points per sub-approximation in strong mode.
    #[arg(long, value_name = "N")]
    samples: Option<usize>,
    /// Worker threads.
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
    /// Soundness acceptance rule.
    #[arg(long, value_enum)]
    acceptance: Option<AcceptanceArg>,
    /// Write the canonical JSON certificate to this path.
    #[arg(long, value_name = "FILE")]
    report_out: Option<PathBuf>,
    /// Write histograms as SVG files into this directory instead of stdout.
    #[arg(long, value_name = "DIR", requires = "error_hist")]
    hist_dir: Option<PathBuf>,
    /// Debug-level logging on stderr.
    #[arg(long, short)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LevelArg {
    Light,
    Strong,
}

impl From<LevelArg> for CheckLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Light => CheckLevel::Light,
            LevelArg::Strong => CheckLevel::Strong,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AcceptanceArg {
    Either,
    Both,
}

impl From<AcceptanceArg> for Acceptance {
    fn from(arg: AcceptanceArg) -> Self {
        match arg {
            AcceptanceArg::Either => Acceptance::Either,
            AcceptanceArg::Both => Acceptance::Both,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<CertifyConfig, AxfError> {
    let mut config = match &cli.config {
        Some(path) => CertifyConfig::load(path)?,
        None => CertifyConfig::default(),
    };
    if let Some(level) = cli.check_level {
        config.check_level = level.into();
    }
    config.exit_on_error |= cli.exit_on_error;
    config.error_hist |= cli.error_hist;
    if let Some(bits) = cli.precision {
        config.precision_bits = bits;
    }
    if let Some(samples) = cli.samples {
        config.samples = samples;
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }
    if let Some(acceptance) = cli.acceptance {
        config.acceptance = acceptance.into();
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<ExitStatus, AxfError> {
    let config = resolve_config(cli)?;
    let (report, input_hash) = import_file_with_hash(&cli.filename)?;

    let evaluator = SampledNormEvaluator::new(config.sampled_opts());
    let strategy = CheckStrategy::for_level(config.check_level, &evaluator);
    let mut svg;
    let mut text;
    let visualizer: Option<&mut dyn Visualizer> = match (&cli.hist_dir, config.error_hist) {
        (_, false) => None,
        (Some(dir), true) => {
            svg = SvgHistogram::new(dir);
            Some(&mut svg as &mut dyn Visualizer)
        }
        (None, true) => {
            text = TextHistogram::new(io::stdout());
            Some(&mut text as &mut dyn Visualizer)
        }
    };

    let outcome = certify(&report, strategy, &config, visualizer)?;
    for violation in &outcome.violations {
        println!("[ERROR] {violation}");
    }

    if let Some(path) = &cli.report_out {
        CertificationReport::new(input_hash, &config, &outcome)?.write(path)?;
        info!(path = %path.display(), "certificate written");
    }
    Ok(outcome.status)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(&cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            error!(fatal = err.is_fatal(), "{err}");
            ExitCode::from(FATAL_EXIT)
        }
    }
}
