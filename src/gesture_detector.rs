//! Lógica por frame de captura e inferencia de gestos.
//!
//! Cada tick recibe el subsistema de hand tracking (o `None` si no hay ninguno
//! registrado), construye el vector de características y, según el modo, lo
//! graba como muestra etiquetada o lo clasifica y actualiza la etiqueta de
//! resultado.

use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::feature_builder::{FeatureVectorBuilder, HandStatus};
use crate::gesture_classifier::{
    Classification, ClassificationResult, ClassifierError, GestureClassifier,
};
use crate::hand_tracking::HandTrackingSubsystem;
use crate::sample_recorder::{RecorderError, SampleRecorder};

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("Modo inferencia sin clasificador cargado")]
    NoClassifier,
}

/// Etiqueta de texto donde se muestra el gesto reconocido
pub trait ResultLabel {
    fn set_text(&mut self, text: &str);
}

/// Etiqueta en memoria
#[derive(Debug, Clone, Default)]
pub struct TextLabel {
    text: String,
}

impl TextLabel {
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl ResultLabel for TextLabel {
    fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorMode {
    Training,
    Inference,
}

/// Qué pasó en un frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No hay subsistema de hand tracking
    NoSubsystem,
    /// Ninguna mano dio datos útiles
    NoData { left: HandStatus, right: HandStatus },
    Recorded { class_id: i32 },
    Classified(ClassificationResult),
    /// El clasificador seguía ocupado con un frame anterior
    Skipped,
}

pub struct GestureDetector<L: ResultLabel> {
    builder: FeatureVectorBuilder,
    recorder: SampleRecorder,
    classifier: Option<Arc<GestureClassifier>>,
    result_label: L,
    class_id: i32,
    warned_no_subsystem: bool,
}

impl<L: ResultLabel> GestureDetector<L> {
    /// Falla si el clasificador espera un vector de otra longitud que el builder
    pub fn new(
        builder: FeatureVectorBuilder,
        recorder: SampleRecorder,
        classifier: Option<Arc<GestureClassifier>>,
        result_label: L,
    ) -> Result<Self, DetectorError> {
        if let Some(classifier) = &classifier {
            if classifier.input_len() != builder.feature_len() {
                return Err(ClassifierError::InvalidFeatureSize {
                    expected: classifier.input_len(),
                    actual: builder.feature_len(),
                }
                .into());
            }
        }

        Ok(Self {
            builder,
            recorder,
            classifier,
            result_label,
            class_id: 0,
            warned_no_subsystem: false,
        })
    }

    pub fn mode(&self) -> DetectorMode {
        if self.recorder.is_recording() {
            DetectorMode::Training
        } else {
            DetectorMode::Inference
        }
    }

    pub fn set_class_id(&mut self, id: i32) {
        self.class_id = id;
    }

    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    /// Descarta lo grabado sin volcar y entra en modo entrenamiento
    pub fn start_training(&mut self) {
        self.recorder.begin_session();
        info!("🎬 Entrenamiento iniciado (clase {})", self.class_id);
    }

    /// Vuelca las muestras al CSV y pasa a modo inferencia
    pub fn stop_training(&mut self) -> Result<usize, DetectorError> {
        let written = self.recorder.end_session()?;
        info!("⏹️  Entrenamiento detenido, {} muestras guardadas", written);
        Ok(written)
    }

    pub fn recorder(&self) -> &SampleRecorder {
        &self.recorder
    }

    pub fn result_label(&self) -> &L {
        &self.result_label
    }

    pub fn classifier(&self) -> Option<&Arc<GestureClassifier>> {
        self.classifier.as_ref()
    }

    /// Un tick de frame
    pub async fn late_update<S: HandTrackingSubsystem>(
        &mut self,
        subsystem: Option<&S>,
    ) -> Result<FrameOutcome, DetectorError> {
        let Some(subsystem) = subsystem else {
            if !self.warned_no_subsystem {
                warn!("No hay subsistema de hand tracking registrado");
                self.warned_no_subsystem = true;
            }
            return Ok(FrameOutcome::NoSubsystem);
        };
        self.warned_no_subsystem = false;

        let frame = self.builder.build(subsystem);
        if !frame.is_usable() {
            return Ok(FrameOutcome::NoData {
                left: frame.left,
                right: frame.right,
            });
        }

        match self.mode() {
            DetectorMode::Training => {
                self.recorder
                    .record_sample(self.class_id, &frame.features)?;
                Ok(FrameOutcome::Recorded {
                    class_id: self.class_id,
                })
            }
            DetectorMode::Inference => {
                let classifier = self.classifier.as_ref().ok_or(DetectorError::NoClassifier)?;
                match classifier.classify(&frame.features).await? {
                    Classification::Scored(result) => {
                        self.result_label.set_text(result.display_text());
                        Ok(FrameOutcome::Classified(result))
                    }
                    Classification::Skipped => Ok(FrameOutcome::Skipped),
                }
            }
        }
    }
}
