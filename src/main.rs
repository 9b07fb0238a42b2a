//! Synheart Triage CLI
//!
//! Explainable multimodal self-triage from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use synheart_triage::{
    config::Config,
    fusion::{CorrelationEngine, CorrelationResult, ModalityAdapter},
    report::ReportBuilder,
    rppg::{RppgSession, SyntheticFrameSource},
    transparency::{create_shared_log_with_persistence, SharedAuditLog},
    triage::{TriageAnswers, UrgencyAssessment, UrgencyScorer},
    MEDICAL_DISCLAIMER, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-triage")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Explainable multimodal self-triage", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full triage: questionnaire, modalities and report
    Assess {
        /// JSON file with `questionnaire`, `voice`, `facial` and `anamnesis` objects
        #[arg(long, short)]
        input: PathBuf,

        /// Directory to write the report to (defaults to the export path)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print the report without writing it
        #[arg(long)]
        no_export: bool,
    },

    /// Score a questionnaire only
    Triage {
        /// JSON file with questionnaire answers
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Run the correlation engine on modality payloads
    Correlate {
        /// JSON file with optional `voice`, `facial` and `anamnesis` objects
        #[arg(long, short)]
        input: PathBuf,

        /// Scale channel weights by provider provenance
        #[arg(long)]
        provenance: bool,
    },

    /// Run a live pulse session on a synthetic camera
    Monitor {
        /// Session length in seconds
        #[arg(long, default_value = "15")]
        seconds: u64,

        /// Pulse rate of the synthetic face
        #[arg(long, default_value = "72")]
        bpm: f64,
    },

    /// Show configuration and cumulative statistics
    Status,

    /// Show configuration
    Config,

    /// Display the medical disclaimer
    Disclaimer,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Assess {
            input,
            output,
            no_export,
        } => cmd_assess(&input, output, no_export),
        Commands::Triage { input } => cmd_triage(&input),
        Commands::Correlate { input, provenance } => cmd_correlate(&input, provenance),
        Commands::Monitor { seconds, bpm } => cmd_monitor(seconds, bpm),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
        Commands::Disclaimer => {
            println!("{MEDICAL_DISCLAIMER}");
            Ok(())
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
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("could not load config, using defaults: {e}");
        Config::default()
    })
}

fn audit_log(config: &Config) -> SharedAuditLog {
    create_shared_log_with_persistence(config.data_path.join("audit.json"))
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn cmd_assess(input: &Path, output: Option<PathBuf>, no_export: bool) -> Result<()> {
    let config = load_config();
    let audit = audit_log(&config);
    let payload = read_json(input)?;
    let adapter = ModalityAdapter::new();

    let questionnaire = payload.get("questionnaire");
    let answers = questionnaire.map(TriageAnswers::from_json);
    let urgency = answers.as_ref().map(|a| UrgencyScorer::new().score(a));
    if urgency.is_some() {
        audit.record_assessment();
    }

    let mut modalities = adapter.adapt_all(&payload);
    if modalities.anamnesis.is_none() {
        if let (Some(answers), Some(urgency)) = (&answers, &urgency) {
            modalities.anamnesis = Some(adapter.anamnesis_from_assessment(urgency, answers));
        }
    }
    let correlation =
        (!modalities.is_empty()).then(|| CorrelationEngine::new().analyze_set(&modalities));

    let report = ReportBuilder::new().build(
        None,
        Some(&modalities),
        correlation.as_ref(),
        urgency.as_ref(),
    );

    if let Some(urgency) = &urgency {
        print_urgency(urgency);
    }
    if let Some(correlation) = &correlation {
        print_correlation(correlation);
    }

    if no_export {
        println!("{}", report.to_json()?);
    } else {
        let dir = output.unwrap_or_else(|| config.export_path.clone());
        let path = report
            .export(&dir)
            .with_context(|| format!("failed to export report to {}", dir.display()))?;
        audit.record_report_exported();
        println!("Report written to {}", path.display());
    }

    audit.save().context("failed to save audit stats")?;
    println!();
    println!("Este resultado não substitui avaliação médica. Em emergência, ligue 192.");
    Ok(())
}

fn cmd_triage(input: &Path) -> Result<()> {
    let config = load_config();
    let audit = audit_log(&config);
    let payload = read_json(input)?;

    // Accept either a bare questionnaire or a combined payload.
    let responses = payload.get("questionnaire").unwrap_or(&payload);
    let assessment = UrgencyScorer::new().score_json(responses);
    audit.record_assessment();
    audit.save().context("failed to save audit stats")?;

    print_urgency(&assessment);
    Ok(())
}

fn cmd_correlate(input: &Path, provenance: bool) -> Result<()> {
    let payload = read_json(input)?;
    let modalities = ModalityAdapter::new().adapt_all(&payload);
    if modalities.is_empty() {
        println!("No voice, facial or anamnesis data found in {}", input.display());
    }

    let engine = if provenance {
        CorrelationEngine::weighted_by_provenance()
    } else {
        CorrelationEngine::new()
    };
    print_correlation(&engine.analyze_set(&modalities));
    Ok(())
}

fn cmd_monitor(seconds: u64, bpm: f64) -> Result<()> {
    let config = load_config();
    let audit = audit_log(&config);

    println!("{MEDICAL_DISCLAIMER}");
    println!("Monitoring a synthetic face at {bpm:.0} bpm for {seconds}s. Press Ctrl+C to stop.");
    println!();

    let fps = 1.0 / config.capture_interval.as_secs_f64().max(1e-3);
    let source = SyntheticFrameSource::new(bpm, fps);
    let mut session = RppgSession::start(&config, source, Arc::clone(&audit));
    session.on_reading(|reading| {
        println!(
            "[{}] {:>6.1} bpm  snr {:>5.1} dB  quality {:<9}  confidence {:.2}{}",
            reading.timestamp.format("%H:%M:%S"),
            reading.bpm,
            reading.snr,
            reading.quality.to_string(),
            reading.confidence(),
            if reading.motion_detected { "  (motion)" } else { "" }
        );
    });

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let started = Instant::now();
    let deadline = Duration::from_secs(seconds);
    let mut last_progress = -1.0;
    while running.load(Ordering::SeqCst) && started.elapsed() < deadline {
        let progress = session.buffer_progress();
        if progress < config.analyzer.readiness_threshold && progress - last_progress >= 0.1 {
            println!("Filling signal window: {:.0}%", progress * 100.0);
            last_progress = progress;
        }
        thread::sleep(Duration::from_millis(100));
    }

    session.stop();
    audit.save().context("failed to save audit stats")?;

    println!();
    println!("{}", audit.summary());
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = load_config();

    println!("Synheart Triage Status");
    println!("======================");
    println!();
    println!("Configuration:");
    println!(
        "  Capture interval: {}ms",
        config.capture_interval.as_millis()
    );
    println!(
        "  Analysis interval: {}ms",
        config.analysis_interval.as_millis()
    );
    println!("  Signal window: {}s", config.analyzer.window.as_secs());
    println!(
        "  Pulse band: {:.0}-{:.0} bpm",
        config.analyzer.min_bpm, config.analyzer.max_bpm
    );
    println!("  Export path: {}", config.export_path.display());
    println!();

    let stats_path = config.data_path.join("audit.json");
    if stats_path.exists() {
        let log = create_shared_log_with_persistence(stats_path);
        let stats = log.stats();
        println!("Cumulative Statistics:");
        println!("  Frames sampled: {}", stats.frames_captured);
        println!("  Frames without a face: {}", stats.frames_skipped);
        println!("  Heart-rate readings: {}", stats.readings_produced);
        println!("  Analyses without a reading: {}", stats.analyses_suppressed);
        println!("  Questionnaires scored: {}", stats.assessments_scored);
        println!("  Reports exported: {}", stats.reports_exported);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", Config::config_path().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_urgency(assessment: &UrgencyAssessment) {
    let level = assessment.level;
    println!("Urgency");
    println!("=======");
    println!(
        "  Level: {} ({}, priority {}, wait up to {} min)",
        level,
        level.color(),
        level.priority(),
        level.max_wait_minutes()
    );
    println!("  Score: {}/100", assessment.score);
    for recommendation in &assessment.recommendations {
        println!("  • {recommendation}");
    }
    if !assessment.missing_fields.is_empty() {
        println!(
            "  Unanswered (scored as no): {}",
            assessment.missing_fields.join(", ")
        );
    }
    println!();
}

fn print_correlation(result: &CorrelationResult) {
    println!("Reliability");
    println!("===========");
    println!(
        "  Trust: {} (reliability {:.2}, weighted confidence {:.2})",
        result.trust_level, result.reliability_score, result.weighted_confidence
    );
    for inconsistency in &result.inconsistencies {
        println!(
            "  ✗ [{:?}/{:?}] {} ({:+.2})",
            inconsistency.kind,
            inconsistency.severity,
            inconsistency.description,
            inconsistency.impact_on_reliability
        );
    }
    for factor in &result.correlation_factors {
        println!(
            "  ✓ {} (strength {:.2}, {:+.2})",
            factor.name, factor.strength, factor.reliability_bonus
        );
    }
    for recommendation in &result.recommendations {
        println!("  • {recommendation}");
    }
    println!();
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
