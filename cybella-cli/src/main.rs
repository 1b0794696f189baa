//! `cybella` command-line host.
//!
//! ```text
//! cybella [--settings FILE] [--strategy average|best_segment] [--stub]
//!         [--save-settings] <file.wav>...
//! ```
//!
//! Prints one JSON object per input file on stdout; logs go to stderr.

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cybella_core::{
    audio::wav,
    inference::{
        onnx,
        stub::{StubClassifier, StubExtractor},
    },
    AggregationStrategy, EmotionEngine, ModelHandle, OnnxModelConfig, PredictionResult,
    TracingObserver,
};
use serde::Serialize;
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct Args {
    settings_path: Option<PathBuf>,
    strategy: Option<AggregationStrategy>,
    stub: bool,
    save_settings: bool,
    files: Vec<PathBuf>,
}

/// One line of output.
#[derive(Debug, Serialize)]
struct FileResult<'a> {
    file: String,
    #[serde(flatten)]
    result: &'a PredictionResult,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let v = it.next().context("missing value for --settings")?;
                args.settings_path = Some(PathBuf::from(v));
            }
            "--strategy" => {
                let v = it.next().context("missing value for --strategy")?;
                args.strategy = Some(v.parse()?);
            }
            "--stub" => args.stub = true,
            "--save-settings" => args.save_settings = true,
            "--help" | "-h" => {
                println!(
                    "Usage: cybella [--settings FILE] [--strategy average|best_segment] [--stub] \\
  [--save-settings] <file.wav>..."
                );
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument: {other}"),
            file => args.files.push(PathBuf::from(file)),
        }
    }
    if args.files.is_empty() {
        anyhow::bail!("no input files (see --help)");
    }
    Ok(args)
}

fn stub_models() -> ModelHandle {
    ModelHandle::new(StubExtractor::new(), StubClassifier::new())
}

fn load_models(settings: &AppSettings, force_stub: bool) -> anyhow::Result<ModelHandle> {
    if force_stub {
        info!("using stub models (--stub)");
        return Ok(stub_models());
    }

    let mut cfg = settings
        .model_dir
        .as_deref()
        .map(OnnxModelConfig::from_dir)
        .unwrap_or_default();
    cfg.apply_softmax = settings.apply_softmax;

    let required = [
        &cfg.embedding_path,
        &cfg.classifier_path,
        &cfg.scaler_path,
        &cfg.labels_path,
    ];
    if required.iter().all(|p| p.exists()) {
        info!("loading ONNX models from {:?}", cfg.embedding_path.parent());
        Ok(onnx::load_models(&cfg)?)
    } else {
        warn!(
            "ONNX model files not found at {:?}, using stub models",
            cfg.embedding_path.parent()
        );
        Ok(stub_models())
    }
}

async fn run() -> anyhow::Result<bool> {
    let args = parse_args()?;

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = args
        .settings_path
        .clone()
        .unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    settings.apply_env_overrides();
    if let Some(strategy) = args.strategy {
        settings.engine.strategy = strategy;
    }
    settings.normalize();
    info!(
        path = %settings_path.display(),
        strategy = %settings.engine.strategy,
        parallel_windows = settings.engine.max_parallel_windows,
        "settings loaded"
    );
    if args.save_settings {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("saving {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    // ── Engine ────────────────────────────────────────────────────────────
    let models = load_models(&settings, args.stub)?;
    let mut engine = EmotionEngine::new(settings.engine.clone(), models);
    if settings.log_segments {
        engine = engine.with_observer(Arc::new(TracingObserver));
    }
    engine.warm_up().context("model warm-up failed")?;

    // ── Predict ───────────────────────────────────────────────────────────
    let mut all_ok = true;
    for path in &args.files {
        let outcome = match wav::load_for_inference(
            path,
            engine.config().sample_rate,
            settings.normalize_input,
        ) {
            Ok(signal) => engine.predict_async(signal).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                let line = serde_json::to_string(&FileResult {
                    file: path.display().to_string(),
                    result: &result,
                })?;
                println!("{line}");
            }
            Err(e) => {
                error!(file = %path.display(), "prediction failed: {e}");
                all_ok = false;
            }
        }
    }

    info!(diagnostics = ?engine.diagnostics_snapshot(), "done");
    Ok(all_ok)
}

#[tokio::main]
async fn main() {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cybella=info")),
        )
        .init();

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("cybella: {e:#}");
            std::process::exit(1);
        }
    }
}
