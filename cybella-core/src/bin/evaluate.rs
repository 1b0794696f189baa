#[cfg(not(feature = "onnx"))]
fn main() {
    eprintln!("cybella evaluate requires the 'onnx' feature");
    std::process::exit(1);
}

#[cfg(feature = "onnx")]
fn main() {
    if let Err(e) = run() {
        eprintln!("evaluation failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(feature = "onnx")]
fn run() -> Result<(), String> {
    use cybella_core::{
        eval, inference::onnx, AggregationStrategy, EmotionEngine, EngineConfig,
        OnnxModelConfig,
    };
    use std::path::PathBuf;

    #[derive(Debug)]
    struct Args {
        dataset_dir: PathBuf,
        strategy: AggregationStrategy,
        model_dir: Option<PathBuf>,
        normalize: bool,
        output: Option<PathBuf>,
    }

    fn parse_args() -> Result<Args, String> {
        let mut dataset_dir: Option<PathBuf> = None;
        let mut strategy = AggregationStrategy::default();
        let mut model_dir: Option<PathBuf> = None;
        let mut normalize = true;
        let mut output: Option<PathBuf> = None;

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--dataset" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --dataset".into());
                    };
                    dataset_dir = Some(PathBuf::from(v));
                }
                "--strategy" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --strategy".into());
                    };
                    strategy = v.parse().map_err(|e| format!("{e}"))?;
                }
                "--model-dir" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --model-dir".into());
                    };
                    model_dir = Some(PathBuf::from(v));
                }
                "--no-normalize" => normalize = false,
                "--output" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --output".into());
                    };
                    output = Some(PathBuf::from(v));
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p cybella-core --features onnx --bin evaluate -- \\
  --dataset <dir> [--strategy average|best_segment] [--model-dir <dir>] \\
  [--no-normalize] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        let dataset_dir = dataset_dir.unwrap_or_else(|| PathBuf::from("data/ravdess"));
        Ok(Args {
            dataset_dir,
            strategy,
            model_dir,
            normalize,
            output,
        })
    }

    let args = parse_args()?;
    if !args.dataset_dir.exists() {
        return Err(format!(
            "dataset directory not found: {}",
            args.dataset_dir.display()
        ));
    }

    let model_config = args
        .model_dir
        .as_deref()
        .map(OnnxModelConfig::from_dir)
        .unwrap_or_default();
    let models = onnx::load_models(&model_config).map_err(|e| e.to_string())?;
    let engine = EmotionEngine::new(EngineConfig::default(), models);
    engine.warm_up().map_err(|e| e.to_string())?;

    println!(
        "Evaluating {} (strategy={}, normalize={})",
        args.dataset_dir.display(),
        args.strategy,
        args.normalize
    );
    let evaluation = eval::evaluate_dir(&engine, &args.dataset_dir, args.strategy, args.normalize)
        .map_err(|e| e.to_string())?;
    let report = &evaluation.report;

    println!(
        "\n{:<12} {:>9} {:>9} {:>9} {:>8}",
        "label", "precision", "recall", "f1", "support"
    );
    for class in &report.per_class {
        println!(
            "{:<12} {:>9.4} {:>9.4} {:>9.4} {:>8}",
            class.label, class.precision, class.recall, class.f1, class.support
        );
    }
    println!(
        "\nDone. scored={} skipped={} failed={} accuracy={:.2}% macro_f1={:.4}",
        report.total,
        evaluation.skipped_unlabelled,
        evaluation.failed,
        report.accuracy * 100.0,
        report.macro_f1
    );

    if let Some(out) = args.output {
        let json = serde_json::to_string_pretty(&evaluation).map_err(|e| e.to_string())?;
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote evaluation report: {}", out.display());
    }

    Ok(())
}
