use std::collections::HashSet;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::AssetSource;
use crate::gesture_classifier::{
    load_classes, ArgmaxAboveThreshold, ClassifierError, FirstAboveThreshold, LabelPolicy,
    DEFAULT_LABELS, DEFAULT_THRESHOLD,
};
use crate::types::{FeatureLayout, FingerId, Handedness, ShapeMeasure};

pub const DEFAULT_MODEL_NAME: &str = "xrhands_gesture_classification.onnx";
pub const POINTS_FILE_NAME: &str = "points.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("No se pudo determinar el directorio de datos")]
    NoDataDir,
}

/// Configuración completa
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub layout: LayoutConfig,
    pub model: ModelConfig,
    pub assets: AssetsConfig,
    pub recorder: RecorderConfig,
    pub debug_display: DebugDisplayConfig,
}

/// Qué dedos y medidas entran en el vector, y en qué orden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub fingers: Vec<FingerId>,
    pub measures: Vec<ShapeMeasure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelingMode {
    #[default]
    FirstAboveThreshold,
    Argmax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Nombre del archivo del modelo dentro de los assets
    pub name: String,
    /// JSON con {"index_to_class": {...}}; si falta se usan `labels`
    pub classes_path: Option<PathBuf>,
    pub labels: Vec<String>,
    pub threshold: f32,
    pub labeling: LabelingMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub streaming_dir: PathBuf,
    /// Si se indica, el modelo se descarga de aquí y se guarda en caché
    pub remote_base_url: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub output_path: Option<PathBuf>,
    pub start_recording: bool,
    pub class_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugDisplayConfig {
    pub handedness: Handedness,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            fingers: FingerId::ALL.to_vec(),
            measures: ShapeMeasure::ALL.to_vec(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            classes_path: None,
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
            labeling: LabelingMode::default(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            streaming_dir: PathBuf::from("assets"),
            remote_base_url: None,
            cache_dir: None,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_path: None,
            start_recording: true,
            class_id: 0,
        }
    }
}

impl Default for DebugDisplayConfig {
    fn default() -> Self {
        Self {
            handedness: Handedness::Right,
        }
    }
}

impl LayoutConfig {
    pub fn to_layout(&self) -> FeatureLayout {
        FeatureLayout::new(self.fingers.clone(), self.measures.clone())
    }
}

impl ModelConfig {
    pub fn policy(&self) -> Box<dyn LabelPolicy> {
        match self.labeling {
            LabelingMode::FirstAboveThreshold => Box::new(FirstAboveThreshold {
                threshold: self.threshold,
            }),
            LabelingMode::Argmax => Box::new(ArgmaxAboveThreshold {
                threshold: self.threshold,
            }),
        }
    }

    /// Nombres de clase en orden de prioridad
    pub fn resolve_labels(&self) -> Result<Vec<String>, ClassifierError> {
        match &self.classes_path {
            Some(path) => load_classes(path),
            None => Ok(self.labels.clone()),
        }
    }
}

impl AssetsConfig {
    pub fn source(&self) -> Result<AssetSource, ConfigError> {
        match &self.remote_base_url {
            Some(base_url) => {
                let cache_dir = match &self.cache_dir {
                    Some(dir) => dir.clone(),
                    None => data_dir()?.join("assets"),
                };
                Ok(AssetSource::Remote {
                    base_url: base_url.clone(),
                    cache_dir,
                })
            }
            None => Ok(AssetSource::Bundled(self.streaming_dir.clone())),
        }
    }
}

impl RecorderConfig {
    pub fn resolved_output_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.output_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(POINTS_FILE_NAME)),
        }
    }
}

/// Directorio de datos persistentes de la aplicación
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("", "", "manoscopio")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(ConfigError::NoDataDir)
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.fingers.is_empty() || self.layout.measures.is_empty() {
            return Err(ConfigError::ValidationError(
                "El layout necesita al menos un dedo y una medida".to_string(),
            ));
        }

        let unique_fingers: HashSet<_> = self.layout.fingers.iter().collect();
        if unique_fingers.len() != self.layout.fingers.len() {
            return Err(ConfigError::ValidationError(
                "Dedos repetidos en el layout".to_string(),
            ));
        }

        let unique_measures: HashSet<_> = self.layout.measures.iter().collect();
        if unique_measures.len() != self.layout.measures.len() {
            return Err(ConfigError::ValidationError(
                "Medidas repetidas en el layout".to_string(),
            ));
        }

        if !(self.model.threshold > 0.0 && self.model.threshold < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "El umbral debe estar en (0, 1), es {}",
                self.model.threshold
            )));
        }

        if self.model.classes_path.is_none() && self.model.labels.is_empty() {
            return Err(ConfigError::ValidationError(
                "Se necesitan etiquetas o un classes_path".to_string(),
            ));
        }

        if self.model.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Falta el nombre del modelo".to_string(),
            ));
        }

        Ok(())
    }
}
