use serde::{Deserialize, Serialize};

/// Lateralidad de una mano rastreada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
    #[default]
    Invalid,
}

/// Dedos en el orden fijo Thumb..Little
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerId {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl FingerId {
    pub const ALL: [FingerId; NUM_FINGERS] = [
        FingerId::Thumb,
        FingerId::Index,
        FingerId::Middle,
        FingerId::Ring,
        FingerId::Little,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FingerId::Thumb => "Thumb",
            FingerId::Index => "Index",
            FingerId::Middle => "Middle",
            FingerId::Ring => "Ring",
            FingerId::Little => "Little",
        }
    }
}

/// Medidas escalares de forma de dedo, en el orden del vector de características
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeMeasure {
    FullCurl,
    BaseCurl,
    TipCurl,
    Pinch,
    Spread,
}

impl ShapeMeasure {
    pub const ALL: [ShapeMeasure; NUM_MEASURES] = [
        ShapeMeasure::FullCurl,
        ShapeMeasure::BaseCurl,
        ShapeMeasure::TipCurl,
        ShapeMeasure::Pinch,
        ShapeMeasure::Spread,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Forma de un dedo: cada medida puede faltar según el proveedor de tracking
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerShape {
    pub full_curl: Option<f32>,
    pub base_curl: Option<f32>,
    pub tip_curl: Option<f32>,
    pub pinch: Option<f32>,
    pub spread: Option<f32>,
}

impl FingerShape {
    /// Forma con las cinco medidas disponibles
    pub fn all(full_curl: f32, base_curl: f32, tip_curl: f32, pinch: f32, spread: f32) -> Self {
        Self {
            full_curl: Some(full_curl),
            base_curl: Some(base_curl),
            tip_curl: Some(tip_curl),
            pinch: Some(pinch),
            spread: Some(spread),
        }
    }

    pub fn get(&self, measure: ShapeMeasure) -> Option<f32> {
        match measure {
            ShapeMeasure::FullCurl => self.full_curl,
            ShapeMeasure::BaseCurl => self.base_curl,
            ShapeMeasure::TipCurl => self.tip_curl,
            ShapeMeasure::Pinch => self.pinch,
            ShapeMeasure::Spread => self.spread,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotación de `degrees` grados alrededor del eje (x, y, z)
    pub fn from_axis_angle_deg(axis: [f32; 3], degrees: f32) -> Self {
        let half = degrees.to_radians() / 2.0;
        let norm = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2])
            .sqrt()
            .max(1e-9);
        let s = half.sin() / norm;
        Self::new(half.cos(), axis[0] * s, axis[1] * s, axis[2] * s)
    }

    pub fn normalized(self) -> Self {
        let norm = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z)
            .sqrt()
            .max(1e-9);

        Self {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        }
    }

    pub fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }

    /// Ángulos de Euler en grados [x, y, z], cada uno en [0, 360).
    /// Orden de rotación Z, X, Y (q = qy * qx * qz).
    pub fn to_euler_degrees(self) -> [f32; 3] {
        let q = self.normalized();

        let sin_x = (2.0 * (q.w * q.x - q.y * q.z)).clamp(-1.0, 1.0);
        let x = sin_x.asin();
        let y = (2.0 * (q.w * q.y + q.x * q.z)).atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
        let z = (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.x * q.x + q.z * q.z));

        [wrap_degrees(x), wrap_degrees(y), wrap_degrees(z)]
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

fn wrap_degrees(radians: f32) -> f32 {
    let deg = radians.to_degrees().rem_euclid(360.0);
    // rem_euclid puede devolver -0.0 o exactamente 360.0 por redondeo
    if deg == 0.0 || deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// Disposición del vector de características: qué dedos y qué medidas,
/// en qué orden. Por mano: 3 rotaciones + dedos x medidas.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayout {
    pub fingers: Vec<FingerId>,
    pub measures: Vec<ShapeMeasure>,
}

impl FeatureLayout {
    pub fn new(fingers: Vec<FingerId>, measures: Vec<ShapeMeasure>) -> Self {
        Self { fingers, measures }
    }

    pub fn per_hand_len(&self) -> usize {
        ROTATION_SLOTS + self.fingers.len() * self.measures.len()
    }

    /// Longitud total del vector (ambas manos, sin la etiqueta de clase)
    pub fn len(&self) -> usize {
        2 * self.per_hand_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Desplazamiento del bloque de una mano; `None` para manos inválidas
    pub fn hand_offset(&self, handedness: Handedness) -> Option<usize> {
        match handedness {
            Handedness::Left => Some(0),
            Handedness::Right => Some(self.per_hand_len()),
            Handedness::Invalid => None,
        }
    }

    /// Índice de una medida dentro del bloque de mano que empieza en `hand_offset`.
    /// Orden finger-major: dedo * medidas + medida.
    pub fn measure_slot(&self, hand_offset: usize, finger_pos: usize, measure_pos: usize) -> usize {
        hand_offset + ROTATION_SLOTS + finger_pos * self.measures.len() + measure_pos
    }
}

impl Default for FeatureLayout {
    fn default() -> Self {
        Self::new(FingerId::ALL.to_vec(), ShapeMeasure::ALL.to_vec())
    }
}

/// Vector plano de características de ambas manos
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// Muestra etiquetada para entrenamiento
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub class_id: i32,
    pub features: FeatureVector,
}

/// Constantes del sistema
pub const NUM_FINGERS: usize = 5;
pub const NUM_MEASURES: usize = 5;
pub const ROTATION_SLOTS: usize = 3; // x, y, z en grados
pub const FEATURES_PER_HAND: usize = ROTATION_SLOTS + NUM_FINGERS * NUM_MEASURES; // 28
pub const TOTAL_FEATURES: usize = 2 * FEATURES_PER_HAND; // 56
