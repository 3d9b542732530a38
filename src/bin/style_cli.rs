use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use style_engine::analysis::{DetectorState, FeatureRecord, StyleResult};
use style_engine::config::EngineConfig;
use style_engine::engine::{DecisionEngine, DecisionEvent, StreamSession};
use style_engine::fixtures::{read_wav, write_wav, SyntheticProfile};
use style_engine::hpss::{HpssEngine, HpssSummary};

/// Longest wait for the final HPSS job when analyzing a file
const HPSS_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(
    name = "style_cli",
    about = "Command line harness for the style decision engine"
)]
struct Cli {
    /// JSON engine configuration (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract features from a WAV file and run the full decision pipeline
    Analyze {
        #[arg(long)]
        wav: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip background harmonic/percussive separation
        #[arg(long)]
        no_hpss: bool,
        /// Size of the audio blocks fed to the session
        #[arg(long, default_value_t = 100)]
        block_ms: u32,
    },
    /// Feed JSON-lines feature records through the decision engine
    Classify {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Separate a WAV file into harmonic and percussive components
    Separate {
        #[arg(long)]
        wav: PathBuf,
        /// Directory for harmonic.wav, percussive.wav and residual.wav
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Stream a synthetic record profile and print decision events
    Demo {
        #[arg(long, default_value = "techno")]
        profile: SyntheticProfile,
        #[arg(long, default_value_t = 5000.0)]
        duration_ms: f64,
    },
    /// Print the effective configuration as JSON
    PrintConfig,
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
    style_engine::init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            wav,
            output,
            no_hpss,
            block_ms,
        } => run_analyze(config, &wav, output, no_hpss, block_ms),
        Commands::Classify { records, output } => run_classify(config, &records, output),
        Commands::Separate { wav, out_dir } => run_separate(config, &wav, out_dir),
        Commands::Demo {
            profile,
            duration_ms,
        } => run_demo(config, profile, duration_ms),
        Commands::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::try_load_from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run_analyze(
    config: EngineConfig,
    wav: &Path,
    output: Option<PathBuf>,
    no_hpss: bool,
    block_ms: u32,
) -> Result<ExitCode> {
    let (samples, sample_rate) = read_wav(wav)?;
    let mut session = if no_hpss {
        StreamSession::without_hpss(config, sample_rate)?
    } else {
        StreamSession::new(config, sample_rate)?
    };

    let block = ((block_ms.max(1) as u64 * sample_rate as u64) / 1000).max(1) as usize;
    let mut events = Vec::new();
    for chunk in samples.chunks(block) {
        events.extend(session.process_audio(chunk));
    }
    if !no_hpss {
        session.flush_hpss(HPSS_FLUSH_TIMEOUT);
    }

    let engine = session.engine();
    let report = StreamReport {
        source: wav.display().to_string(),
        sample_rate: Some(sample_rate),
        duration_ms: samples.len() as f64 * 1000.0 / sample_rate.max(1) as f64,
        final_state: engine.state(),
        style: final_style(engine),
        hpss: session.last_hpss(),
        event_count: events.len(),
        events: &events,
    };
    emit_report(&report, output)?;
    Ok(ExitCode::from(0))
}

fn run_classify(config: EngineConfig, path: &Path, output: Option<PathBuf>) -> Result<ExitCode> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut engine = DecisionEngine::new(config)?;

    let mut events = Vec::new();
    let mut last_timestamp = 0.0;
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: FeatureRecord = serde_json::from_str(line)
            .with_context(|| format!("parsing record on line {}", line_no + 1))?;
        last_timestamp = record.timestamp_ms;
        events.extend(engine.push_frame(record));
    }

    let report = StreamReport {
        source: path.display().to_string(),
        sample_rate: None,
        duration_ms: last_timestamp,
        final_state: engine.state(),
        style: final_style(&engine),
        hpss: None,
        event_count: events.len(),
        events: &events,
    };
    emit_report(&report, output)?;
    Ok(ExitCode::from(0))
}

fn run_separate(config: EngineConfig, wav: &Path, out_dir: Option<PathBuf>) -> Result<ExitCode> {
    let (samples, sample_rate) = read_wav(wav)?;
    let engine = HpssEngine::new(config.hpss)?;
    let result = engine.separate(&samples);

    if let Some(dir) = out_dir.as_ref() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        write_wav(&dir.join("harmonic.wav"), &result.harmonic, sample_rate)?;
        write_wav(&dir.join("percussive.wav"), &result.percussive, sample_rate)?;
        write_wav(&dir.join("residual.wav"), &result.residual, sample_rate)?;
    }

    let report = SeparationReport {
        source: wav.display().to_string(),
        sample_rate,
        input_samples: samples.len(),
        output_samples: result.len(),
        summary: result.summary(),
        out_dir: out_dir.map(|dir| dir.display().to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_demo(config: EngineConfig, profile: SyntheticProfile, duration_ms: f64) -> Result<ExitCode> {
    let mut engine = DecisionEngine::new(config)?;
    for record in profile.records(duration_ms) {
        for event in engine.push_frame(record) {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    eprintln!(
        "[style_cli] {} profile finished in state {}",
        profile,
        engine.state().as_str()
    );
    Ok(ExitCode::from(0))
}

/// The committed decision if there is one, otherwise a snapshot classification
fn final_style(engine: &DecisionEngine) -> StyleResult {
    engine
        .last_decision()
        .map(|decision| decision.style.clone())
        .unwrap_or_else(|| engine.classify_now())
}

fn emit_report(report: &StreamReport<'_>, output_path: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

#[derive(Serialize)]
struct StreamReport<'a> {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    duration_ms: f64,
    final_state: DetectorState,
    style: StyleResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    hpss: Option<HpssSummary>,
    event_count: usize,
    #[serde(skip_serializing_if = "slice_empty")]
    events: &'a [DecisionEvent],
}

fn slice_empty(events: &&[DecisionEvent]) -> bool {
    events.is_empty()
}

#[derive(Serialize)]
struct SeparationReport {
    source: String,
    sample_rate: u32,
    input_samples: usize,
    output_samples: usize,
    summary: HpssSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_dir: Option<String>,
}
