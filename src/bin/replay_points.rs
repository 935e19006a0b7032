use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use manoscopio::assets::AssetLocator;
use manoscopio::config::AppConfig;
use manoscopio::csv_loader::load_samples_from_csv;
use manoscopio::gesture_classifier::{Classification, GestureClassifier};
use manoscopio::logging::init_logger;

const USAGE: &str = "Uso: replay_points [--config <archivo.toml>] [--dump-features] <points.csv>";

struct ReplayOptions {
    config_path: Option<PathBuf>,
    dump_features: bool,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut opts = ReplayOptions {
        config_path: None,
        dump_features: false,
    };
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-features" => opts.dump_features = true,
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
                opts.config_path = Some(PathBuf::from(path));
            }
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV"))?;
    Ok((csv_path, opts))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logger();
    let (csv_path, opts) = parse_args()?;

    let config = match &opts.config_path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("No se pudo cargar {}", path.display()))?,
        None => AppConfig::default(),
    };
    let layout = config.layout.to_layout();

    println!("🎞️  Reproduciendo muestras desde {:?}", csv_path);
    let samples = load_samples_from_csv(&csv_path, Some(layout.len()))?;

    let locator = AssetLocator::new(config.assets.source()?);
    let model_path = locator.resolve(&config.model.name)?;
    let classifier = GestureClassifier::load(
        &model_path,
        config.model.resolve_labels()?,
        layout.len(),
        config.model.policy(),
    )?;

    let mut matches = 0usize;
    let mut unlabeled = 0usize;
    for (row, sample) in samples.iter().enumerate() {
        let result = match classifier.classify(&sample.features).await? {
            Classification::Scored(result) => result,
            Classification::Skipped => continue,
        };

        let predicted = result.class_index.map(|idx| idx as i32);
        match predicted {
            Some(class) if class == sample.class_id => matches += 1,
            None => unlabeled += 1,
            _ => {}
        }

        let best = result
            .probabilities
            .iter()
            .copied()
            .fold(0.0f32, f32::max);
        println!(
            "  {:>4}. clase {:>2} -> {:<10} (máx {:>6.2}%)",
            row + 1,
            sample.class_id,
            if result.display_text().is_empty() {
                "-"
            } else {
                result.display_text()
            },
            best * 100.0
        );

        if opts.dump_features {
            for (idx, value) in sample.features.as_slice().iter().enumerate() {
                println!("        {:03}: {:>12.6}", idx, value);
            }
        }
    }

    let stats = classifier.stats();
    println!(
        "\n✅ {}/{} coinciden con la clase grabada, {} sin etiqueta ({} inferencias)",
        matches,
        samples.len(),
        unlabeled,
        stats.completed
    );

    Ok(())
}
