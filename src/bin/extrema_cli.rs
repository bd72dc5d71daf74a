use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pcm_extrema::report::{render_analysis, render_comparison};
use pcm_extrema::source::{
    write_text_samples, write_wav_i16, SampleSource, SyntheticPattern, SyntheticSource,
    TextSource, WavSource,
};
use pcm_extrema::{AppConfig, Analyzer, Backend, SampleBuffer};
use serde::Serialize;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "extrema_cli",
    about = "Global and interval min/max amplitude analysis of PCM signals"
)]
struct Cli {
    /// JSON configuration file (defaults apply when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log verbosity written to stderr
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a signal with one backend
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        #[arg(long, value_enum, default_value_t = BackendArg::Cpu)]
        backend: BackendArg,
        /// Emit the JSON report instead of the console layout
        #[arg(long)]
        json: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the sequential baseline and a parallel backend, exit 2 when the
    /// global results differ
    Compare {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        #[arg(long, value_enum, default_value_t = BackendArg::Cpu)]
        backend: BackendArg,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a synthetic signal or a converted WAV as text or WAV
    Generate {
        #[command(flatten)]
        input: InputArgs,
        /// Destination; `.wav` writes 16-bit PCM, anything else one float per line
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// WAV file to analyze
    #[arg(long, conflicts_with_all = ["text", "synthetic"])]
    wav: Option<PathBuf>,
    /// Text file with one sample per line
    #[arg(long, conflicts_with = "synthetic")]
    text: Option<PathBuf>,
    /// Generated signal (the default input)
    #[arg(long, value_enum)]
    synthetic: Option<PatternArg>,
    /// Sample rate for text and synthetic input
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Synthetic signal length in seconds
    #[arg(long)]
    duration: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Sine frequency for `--synthetic sine`
    #[arg(long, default_value_t = 440.0)]
    frequency: f32,
}

#[derive(Args, Debug)]
struct TuningArgs {
    /// Interval length in seconds
    #[arg(long)]
    interval_seconds: Option<f64>,
    /// Work-group size of the global reduction (power of two)
    #[arg(long)]
    group_size: Option<u32>,
    /// Number of intervals printed in console output
    #[arg(long)]
    preview: Option<usize>,
    /// Fail instead of re-running sequentially when the device fails
    #[arg(long)]
    no_fallback: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum BackendArg {
    Sequential,
    Cpu,
    Gpu,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Sequential => Backend::Sequential,
            BackendArg::Cpu => Backend::CpuParallel,
            BackendArg::Gpu => Backend::Gpu,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PatternArg {
    Uniform,
    Sine,
    Ramp,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    pcm_extrema::init_logging(cli.log_level);
    let mut config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Analyze {
            input,
            tuning,
            backend,
            json,
            output,
        } => {
            tuning.apply(&mut config);
            run_analyze(config, &input, backend.into(), json, output)
        }
        Commands::Compare {
            input,
            tuning,
            backend,
            json,
            output,
        } => {
            tuning.apply(&mut config);
            run_compare(config, &input, backend.into(), json, output)
        }
        Commands::Generate { input, output } => run_generate(&config, &input, &output),
    }
}

impl TuningArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(seconds) = self.interval_seconds {
            config.analysis.interval_seconds = seconds;
        }
        if let Some(group_size) = self.group_size {
            config.device.group_size = group_size;
        }
        if let Some(preview) = self.preview {
            config.analysis.preview_intervals = preview;
        }
        if self.no_fallback {
            config.device.fallback_to_sequential = false;
        }
    }
}

impl InputArgs {
    fn source(&self, config: &AppConfig) -> Box<dyn SampleSource> {
        let sample_rate = self.sample_rate.unwrap_or(config.analysis.sample_rate);
        if let Some(path) = &self.wav {
            return Box::new(WavSource::new(path));
        }
        if let Some(path) = &self.text {
            return Box::new(TextSource::new(path, sample_rate));
        }

        let pattern = match self.synthetic.unwrap_or(PatternArg::Uniform) {
            PatternArg::Uniform => SyntheticPattern::Uniform,
            PatternArg::Sine => SyntheticPattern::Sine {
                frequency_hz: self.frequency,
                amplitude: 1.0,
            },
            PatternArg::Ramp => SyntheticPattern::Ramp,
        };
        let mut synthetic = config.synthetic.clone();
        if let Some(duration) = self.duration {
            synthetic.duration_seconds = duration;
        }
        if self.seed.is_some() {
            synthetic.seed = self.seed;
        }
        Box::new(SyntheticSource::from_config(pattern, sample_rate, &synthetic))
    }

    fn load(&self, config: &AppConfig) -> Result<SampleBuffer> {
        let source = self.source(config);
        source
            .load()
            .map_err(|err| {
                pcm_extrema::error::log_source_error(&err, "extrema_cli");
                err
            })
            .with_context(|| format!("loading {}", source.describe()))
    }
}

fn run_analyze(
    config: AppConfig,
    input: &InputArgs,
    backend: Backend,
    json: bool,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let buffer = input.load(&config)?;
    let analyzer = Analyzer::new(config);
    let preview = analyzer.config().analysis.preview_intervals;
    let report = analyzer
        .analyze(&buffer, backend)
        .with_context(|| format!("analyzing with {backend:?}"))?;

    if json {
        emit_json(&report, output.as_deref())?;
    } else {
        emit_text(&render_analysis(&report, preview), output.as_deref())?;
    }
    Ok(ExitCode::from(0))
}

fn run_compare(
    config: AppConfig,
    input: &InputArgs,
    backend: Backend,
    json: bool,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    if !backend.is_parallel() {
        bail!("compare needs a parallel backend (cpu or gpu)");
    }
    let buffer = input.load(&config)?;
    let analyzer = Analyzer::new(config);
    let preview = analyzer.config().analysis.preview_intervals;
    let report = analyzer
        .compare(&buffer, backend)
        .with_context(|| format!("comparing sequential with {backend:?}"))?;

    if json {
        emit_json(&report, output.as_deref())?;
    } else {
        emit_text(&render_comparison(&report, preview), output.as_deref())?;
    }

    if !report.globals_match {
        eprintln!(
            "Global extrema differ: sequential {:?} vs parallel {:?}",
            report.sequential.global.extrema, report.parallel.global.extrema
        );
    }
    Ok(ExitCode::from(report.exit_code()))
}

fn run_generate(config: &AppConfig, input: &InputArgs, output: &Path) -> Result<ExitCode> {
    let buffer = input.load(config)?;
    let is_wav = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    let written = if is_wav {
        write_wav_i16(output, &buffer)
    } else {
        write_text_samples(output, buffer.samples())
    };
    written.with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Wrote {} samples at {} Hz to {}",
        buffer.len(),
        buffer.sample_rate(),
        output.display()
    );
    Ok(ExitCode::from(0))
}

fn emit_json<T: Serialize>(report: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    emit_text(&json, output)
}

fn emit_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{text}"),
    }
    Ok(())
}
