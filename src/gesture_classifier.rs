use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use log::{debug, info, trace, warn};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::types::FeatureVector;

/// Umbral de confianza para asignar etiqueta
pub const DEFAULT_THRESHOLD: f32 = 0.8;

/// Clases del modelo de ejemplo, en orden de prioridad
pub const DEFAULT_LABELS: [&str; 4] = ["I", "Love", "Unity", "6"];

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("Model {kind} shape mismatch: expected {expected}, model declares {actual}")]
    ShapeMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("No classes defined")]
    NoClasses,

    #[error("Inference worker stopped unexpectedly")]
    WorkerStopped,

    #[error("Classifier already released")]
    Released,
}

/// Modelo que produce puntuaciones sin normalizar para un vector de entrada
pub trait ScoreModel: Send {
    /// Tamaño de entrada declarado por el modelo, si es fijo
    fn input_len(&self) -> Option<usize>;

    /// Número de salidas declarado por el modelo, si es fijo
    fn output_len(&self) -> Option<usize>;

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError>;
}

/// Modelo ONNX ejecutado con ONNX Runtime
pub struct OnnxModel {
    session: Session,
    input_name: String,
    output_name: String,
    input_len: Option<usize>,
    output_len: Option<usize>,
}

impl OnnxModel {
    pub fn load(model_path: &Path) -> Result<Self, ClassifierError> {
        let session = Session::builder()?.commit_from_file(model_path)?;

        let input = session
            .inputs
            .first()
            .ok_or(ClassifierError::MissingIo { kind: "input" })?;
        let input_name = input.name.clone();
        let input_len = declared_last_dim(&input.input_type);

        let output = session
            .outputs
            .iter()
            .find(|output| {
                matches!(
                    output.output_type,
                    ValueType::Tensor {
                        ty: TensorElementType::Float32,
                        ..
                    }
                )
            })
            .or_else(|| session.outputs.first())
            .ok_or(ClassifierError::MissingIo { kind: "output" })?;
        let output_name = output.name.clone();
        let output_len = declared_last_dim(&output.output_type);

        info!("[ONNX] Modelo cargado: {}", model_path.display());
        debug!("[ONNX] Input: {} ({:?})", input_name, input_len);
        debug!("[ONNX] Output: {} ({:?})", output_name, output_len);

        Ok(Self {
            session,
            input_name,
            output_name,
            input_len,
            output_len,
        })
    }
}

/// Última dimensión de un tensor si es fija (las dinámicas vienen como -1)
fn declared_last_dim(value_type: &ValueType) -> Option<usize> {
    match value_type {
        ValueType::Tensor { shape, .. } => shape
            .last()
            .copied()
            .filter(|&dim| dim > 0)
            .map(|dim| dim as usize),
        _ => None,
    }
}

impl ScoreModel for OnnxModel {
    fn input_len(&self) -> Option<usize> {
        self.input_len
    }

    fn output_len(&self) -> Option<usize> {
        self.output_len
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        // Tensor de entrada [1, N]
        let shape_vec = vec![1_usize, input.len()];
        let input_value = Tensor::from_array((shape_vec, input.to_vec()))?;

        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => input_value,
        ])?;

        let (_shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        Ok(data.to_vec())
    }
}

/// Softmax numéricamente estable
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Etapa softmax añadida a la salida de un modelo de puntuaciones.
/// Se compone una sola vez al cargar.
pub struct SoftmaxHead<M> {
    inner: M,
}

impl<M: ScoreModel> SoftmaxHead<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<M: ScoreModel> ScoreModel for SoftmaxHead<M> {
    fn input_len(&self) -> Option<usize> {
        self.inner.input_len()
    }

    fn output_len(&self) -> Option<usize> {
        self.inner.output_len()
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        let scores = self.inner.run(input)?;
        Ok(softmax(&scores))
    }
}

/// Política para pasar de probabilidades a una clase
pub trait LabelPolicy: Send + Sync {
    fn select(&self, probabilities: &[f32]) -> Option<usize>;
}

/// Primera clase (en orden de prioridad) cuya probabilidad supera estrictamente el umbral
pub fn first_above_threshold(probabilities: &[f32], threshold: f32) -> Option<usize> {
    probabilities.iter().position(|&p| p > threshold)
}

/// Clase de mayor probabilidad, si supera estrictamente el umbral
pub fn argmax_above_threshold(probabilities: &[f32], threshold: f32) -> Option<usize> {
    probabilities
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p > threshold)
        .fold(None, |best: Option<(usize, f32)>, (idx, &p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((idx, p)),
        })
        .map(|(idx, _)| idx)
}

#[derive(Debug, Clone, Copy)]
pub struct FirstAboveThreshold {
    pub threshold: f32,
}

impl LabelPolicy for FirstAboveThreshold {
    fn select(&self, probabilities: &[f32]) -> Option<usize> {
        first_above_threshold(probabilities, self.threshold)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArgmaxAboveThreshold {
    pub threshold: f32,
}

impl LabelPolicy for ArgmaxAboveThreshold {
    fn select(&self, probabilities: &[f32]) -> Option<usize> {
        argmax_above_threshold(probabilities, self.threshold)
    }
}

/// Probabilidades por clase y la etiqueta elegida, si alguna
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub probabilities: Vec<f32>,
    pub class_index: Option<usize>,
    pub label: Option<String>,
}

impl ClassificationResult {
    /// Texto para la etiqueta de resultado: vacío si no hubo coincidencia
    pub fn display_text(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Scored(ClassificationResult),
    /// Había una inferencia en curso; este frame no se clasificó
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceState {
    Idle,
    Pending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceStats {
    pub started: u64,
    pub completed: u64,
    pub skipped: u64,
}

struct InferenceJob {
    input: Vec<f32>,
    reply: oneshot::Sender<Result<Vec<f32>, ClassifierError>>,
}

/// Estado compartido con el worker. Solo el worker vuelve a Idle, al terminar
/// el trabajo, aunque quien lo pidió ya no espere la respuesta.
struct InferenceSlot {
    state: Mutex<InferenceState>,
    started: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
}

impl InferenceSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(InferenceState::Idle),
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    fn state(&self) -> InferenceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pasa a Pending si estaba Idle
    fn try_acquire(&self) -> bool {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *current {
            InferenceState::Pending => false,
            InferenceState::Idle => {
                *current = InferenceState::Pending;
                true
            }
        }
    }

    fn set_idle(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = InferenceState::Idle;
    }
}

#[derive(Debug, Deserialize)]
struct ClassesJson {
    index_to_class: HashMap<String, String>,
}

/// Carga los nombres de clase desde un JSON {"index_to_class": {"0": "...", ...}}
pub fn load_classes(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let content = fs::read_to_string(path)?;
    let data: ClassesJson = serde_json::from_str(&content)?;

    // Convertir HashMap a Vec ordenado por índice
    let mut pairs: Vec<(usize, String)> = data
        .index_to_class
        .into_iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
        .collect();

    pairs.sort_by_key(|(idx, _)| *idx);
    Ok(pairs.into_iter().map(|(_, name)| name).collect())
}

/// Clasificador de gestos: un worker de inferencia dedicado, como mucho una
/// petición en vuelo, y una política de etiquetado intercambiable.
pub struct GestureClassifier {
    requests: Option<Sender<InferenceJob>>,
    worker: Option<JoinHandle<()>>,
    slot: Arc<InferenceSlot>,
    labels: Vec<String>,
    input_len: usize,
    policy: Box<dyn LabelPolicy>,
}

impl GestureClassifier {
    /// Carga un modelo ONNX, le añade la etapa softmax y arranca el worker
    pub fn load(
        model_path: &Path,
        labels: Vec<String>,
        input_len: usize,
        policy: Box<dyn LabelPolicy>,
    ) -> Result<Self, ClassifierError> {
        let model = OnnxModel::load(model_path)?;
        Self::from_model(model, labels, input_len, policy)
    }

    /// Envuelve un modelo de puntuaciones con softmax y arranca el worker.
    /// Falla si las dimensiones declaradas no cuadran con la configuración.
    pub fn from_model<M: ScoreModel + 'static>(
        model: M,
        labels: Vec<String>,
        input_len: usize,
        policy: Box<dyn LabelPolicy>,
    ) -> Result<Self, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::NoClasses);
        }
        if let Some(actual) = model.input_len() {
            if actual != input_len {
                return Err(ClassifierError::ShapeMismatch {
                    kind: "input",
                    expected: input_len,
                    actual,
                });
            }
        }
        if let Some(actual) = model.output_len() {
            if actual != labels.len() {
                return Err(ClassifierError::ShapeMismatch {
                    kind: "output",
                    expected: labels.len(),
                    actual,
                });
            }
        }

        let model: Box<dyn ScoreModel> = Box::new(SoftmaxHead::new(model));
        let slot = Arc::new(InferenceSlot::new());
        let (requests, worker) = spawn_worker(model, Arc::clone(&slot))?;
        info!("Clasificador listo: {} clases {:?}", labels.len(), labels);

        Ok(Self {
            requests: Some(requests),
            worker: Some(worker),
            slot,
            labels,
            input_len,
            policy,
        })
    }

    /// Clasifica un vector. Si ya hay una inferencia en curso devuelve
    /// `Classification::Skipped` sin lanzar otra. Si este future se suelta antes
    /// de terminar, la inferencia sigue en el worker y el clasificador queda
    /// Pending hasta que acabe.
    pub async fn classify(
        &self,
        features: &FeatureVector,
    ) -> Result<Classification, ClassifierError> {
        let requests = self.requests.as_ref().ok_or(ClassifierError::Released)?;

        if features.len() != self.input_len {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: self.input_len,
                actual: features.len(),
            });
        }

        if !self.slot.try_acquire() {
            self.slot.skipped.fetch_add(1, Ordering::Relaxed);
            trace!("Inferencia en curso, frame omitido");
            return Ok(Classification::Skipped);
        }

        let (reply, response) = oneshot::channel();
        let job = InferenceJob {
            input: features.as_slice().to_vec(),
            reply,
        };
        if requests.send(job).is_err() {
            self.slot.set_idle();
            return Err(ClassifierError::WorkerStopped);
        }

        let probabilities = match response.await {
            Ok(result) => result?,
            Err(_) => {
                // El worker cayó sin responder
                self.slot.set_idle();
                return Err(ClassifierError::WorkerStopped);
            }
        };

        if probabilities.len() != self.labels.len() {
            return Err(ClassifierError::ShapeMismatch {
                kind: "output",
                expected: self.labels.len(),
                actual: probabilities.len(),
            });
        }

        let class_index = self.policy.select(&probabilities);
        let label = class_index.and_then(|idx| self.labels.get(idx).cloned());

        Ok(Classification::Scored(ClassificationResult {
            probabilities,
            class_index,
            label,
        }))
    }

    pub fn state(&self) -> InferenceState {
        self.slot.state()
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            started: self.slot.started.load(Ordering::Relaxed),
            completed: self.slot.completed.load(Ordering::Relaxed),
            skipped: self.slot.skipped.load(Ordering::Relaxed),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn is_released(&self) -> bool {
        self.requests.is_none()
    }

    /// Libera el worker de inferencia. Llamadas posteriores no hacen nada.
    pub fn release(&mut self) {
        // Cerrar el canal termina el bucle del worker
        if self.requests.take().is_none() {
            return;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("El worker de inferencia terminó con pánico");
            }
        }
        info!("Worker de inferencia liberado");
    }
}

impl Drop for GestureClassifier {
    fn drop(&mut self) {
        self.release();
    }
}

fn spawn_worker(
    mut model: Box<dyn ScoreModel>,
    slot: Arc<InferenceSlot>,
) -> Result<(Sender<InferenceJob>, JoinHandle<()>), ClassifierError> {
    let (tx, rx) = unbounded::<InferenceJob>();
    let handle = std::thread::Builder::new()
        .name("inference-worker".to_string())
        .spawn(move || {
            while let Ok(job) = rx.recv() {
                slot.started.fetch_add(1, Ordering::Relaxed);
                let result = model.run(&job.input);
                // Cuenta también las inferencias fallidas
                slot.completed.fetch_add(1, Ordering::Relaxed);
                // Idle antes de responder, para que quien espera pueda pedir otra
                slot.set_idle();
                // Si quien pidió la inferencia ya no espera, se descarta
                let _ = job.reply.send(result);
            }
            debug!("Worker de inferencia terminado");
        })?;
    Ok((tx, handle))
}
