/*
Manoscopio - captura y reconocimiento de gestos de mano con ONNX

Cada línea de stdin es un frame de hand tracking en JSON (o `null` si no hay
subsistema ese frame):
  {"left": {"handedness": "left", "palm_rotation": {"w":1,"x":0,"y":0,"z":0}, "fingers": [...]},
   "right": {...}}

Modos:
  --train <clase>  graba muestras etiquetadas; al cerrar stdin se añaden a points.csv
  --infer          clasifica cada frame e imprime la etiqueta reconocida

Antes de inferir, asegurarse de tener onnxruntime disponible:
set -x LD_LIBRARY_PATH (pwd)/onnxruntime-linux-x64-1.22.0/lib $LD_LIBRARY_PATH
     cat frames.jsonl | ./target/release/manoscopio --infer
*/

use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info, warn};

use manoscopio::assets::AssetLocator;
use manoscopio::config::AppConfig;
use manoscopio::debug_display::{DebugDisplayAdapter, SlotBoard};
use manoscopio::feature_builder::FeatureVectorBuilder;
use manoscopio::gesture_classifier::GestureClassifier;
use manoscopio::gesture_detector::{DetectorMode, FrameOutcome, GestureDetector, TextLabel};
use manoscopio::hand_tracking::SnapshotSubsystem;
use manoscopio::logging::init_logger;
use manoscopio::sample_recorder::SampleRecorder;
use manoscopio::types::NUM_FINGERS;

const USAGE: &str = "Uso: manoscopio [--config <archivo.toml>] [--train <clase> | --infer] [--show-fingers]";

struct HostOptions {
    config_path: Option<PathBuf>,
    mode: Option<DetectorMode>,
    class_id: Option<i32>,
    show_fingers: bool,
}

fn parse_args() -> Result<HostOptions> {
    let mut opts = HostOptions {
        config_path: None,
        mode: None,
        class_id: None,
        show_fingers: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
                opts.config_path = Some(PathBuf::from(path));
            }
            "--train" => {
                let class = args.next().ok_or_else(|| anyhow!(USAGE))?;
                let class_id = class
                    .parse::<i32>()
                    .with_context(|| format!("Clase inválida: {}", class))?;
                opts.mode = Some(DetectorMode::Training);
                opts.class_id = Some(class_id);
            }
            "--infer" => opts.mode = Some(DetectorMode::Inference),
            "--show-fingers" => opts.show_fingers = true,
            _ => bail!(USAGE),
        }
    }

    Ok(opts)
}

fn load_classifier(config: &AppConfig, input_len: usize) -> Result<GestureClassifier> {
    let locator = AssetLocator::new(config.assets.source()?);
    let model_path = locator.resolve(&config.model.name)?;
    let labels = config.model.resolve_labels()?;
    info!("🔧 Cargando modelo {}", model_path.display());
    let classifier =
        GestureClassifier::load(&model_path, labels, input_len, config.model.policy())?;
    Ok(classifier)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logger();
    let opts = parse_args()?;

    let config = match &opts.config_path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("No se pudo cargar {}", path.display()))?,
        None => AppConfig::default(),
    };

    let mode = opts.mode.unwrap_or(if config.recorder.start_recording {
        DetectorMode::Training
    } else {
        DetectorMode::Inference
    });

    let builder = FeatureVectorBuilder::new(config.layout.to_layout());
    let output_path = config.recorder.resolved_output_path()?;
    let recorder = SampleRecorder::new(&output_path, mode == DetectorMode::Training);

    // Sin modelo se puede seguir grabando; para inferir es obligatorio
    let classifier = match load_classifier(&config, builder.feature_len()) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) if mode == DetectorMode::Training => {
            warn!("Clasificación deshabilitada: {:#}", e);
            None
        }
        Err(e) => return Err(e.context("No se pudo cargar el clasificador")),
    };

    let mut detector = GestureDetector::new(builder, recorder, classifier, TextLabel::default())?;
    detector.set_class_id(opts.class_id.unwrap_or(config.recorder.class_id));

    let mut finger_display = opts.show_fingers.then(|| {
        let mut adapter = DebugDisplayAdapter::new(config.debug_display.handedness, SlotBoard::new());
        adapter.start();
        adapter
    });

    match detector.mode() {
        DetectorMode::Training => println!(
            "🎬 Grabando clase {} en {}",
            detector.class_id(),
            output_path.display()
        ),
        DetectorMode::Inference => println!("🎯 Reconociendo gestos"),
    }

    let mut last_label = String::new();
    for (frame_idx, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("Error leyendo stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let subsystem: Option<SnapshotSubsystem> = match serde_json::from_str(&line) {
            Ok(subsystem) => subsystem,
            Err(e) => {
                warn!("Frame {} ignorado: {}", frame_idx, e);
                continue;
            }
        };

        if let Some(adapter) = finger_display.as_mut() {
            if adapter.update(subsystem.as_ref()) {
                for finger in 0..NUM_FINGERS {
                    println!("   {}", adapter.display().render_line(finger));
                }
            }
        }

        match detector.late_update(subsystem.as_ref()).await {
            Ok(FrameOutcome::Classified(result)) => {
                let label = result.display_text();
                if label != last_label {
                    let confidence = result
                        .class_index
                        .and_then(|idx| result.probabilities.get(idx))
                        .copied()
                        .unwrap_or(0.0);
                    if label.is_empty() {
                        println!("[{}] ·", frame_idx);
                    } else {
                        println!("[{}] ✋ {} ({:.1}%)", frame_idx, label, confidence * 100.0);
                    }
                    last_label = label.to_string();
                }
            }
            Ok(_) => {}
            Err(e) => error!("Frame {}: {}", frame_idx, e),
        }
    }

    if detector.mode() == DetectorMode::Training {
        let written = detector.stop_training()?;
        println!("💾 {} muestras guardadas en {}", written, output_path.display());
    }

    Ok(())
}
