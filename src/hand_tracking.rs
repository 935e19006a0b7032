//! Colaborador externo de hand tracking.
//!
//! El sistema solo consume consultas tipo "pull" por frame: pose de la palma y
//! forma de cada dedo. El proveedor se inyecta explícitamente en cada tick.

use serde::{Deserialize, Serialize};

use crate::types::{FingerId, FingerShape, Handedness, Quaternion, NUM_FINGERS};

/// Una mano tal como la expone el proveedor de tracking en el frame actual
pub trait TrackedHand {
    fn handedness(&self) -> Handedness;

    /// Rotación de la articulación de la palma, si el proveedor tiene pose
    fn palm_rotation(&self) -> Option<Quaternion>;

    /// Calcula la forma de un dedo; las medidas no soportadas vienen en `None`
    fn finger_shape(&self, finger: FingerId) -> FingerShape;
}

/// Subsistema de hand tracking con ambas manos
pub trait HandTrackingSubsystem {
    type Hand: TrackedHand;

    fn left_hand(&self) -> &Self::Hand;
    fn right_hand(&self) -> &Self::Hand;

    fn hand(&self, handedness: Handedness) -> Option<&Self::Hand> {
        match handedness {
            Handedness::Left => Some(self.left_hand()),
            Handedness::Right => Some(self.right_hand()),
            Handedness::Invalid => None,
        }
    }
}

/// Captura de una mano en un frame (datos planos, serializable)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandSnapshot {
    pub handedness: Handedness,
    pub palm_rotation: Option<Quaternion>,
    pub fingers: [FingerShape; NUM_FINGERS],
}

impl HandSnapshot {
    pub fn new(handedness: Handedness) -> Self {
        Self {
            handedness,
            ..Self::default()
        }
    }

    pub fn with_palm(mut self, rotation: Quaternion) -> Self {
        self.palm_rotation = Some(rotation);
        self
    }

    pub fn with_finger(mut self, finger: FingerId, shape: FingerShape) -> Self {
        self.fingers[finger.index()] = shape;
        self
    }
}

impl TrackedHand for HandSnapshot {
    fn handedness(&self) -> Handedness {
        self.handedness
    }

    fn palm_rotation(&self) -> Option<Quaternion> {
        self.palm_rotation
    }

    fn finger_shape(&self, finger: FingerId) -> FingerShape {
        self.fingers[finger.index()]
    }
}

/// Subsistema construido a partir de capturas ya tomadas (replay, tests, stdin)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSubsystem {
    pub left: HandSnapshot,
    pub right: HandSnapshot,
}

impl SnapshotSubsystem {
    pub fn new(left: HandSnapshot, right: HandSnapshot) -> Self {
        Self { left, right }
    }
}

impl Default for SnapshotSubsystem {
    fn default() -> Self {
        Self::new(
            HandSnapshot::new(Handedness::Left),
            HandSnapshot::new(Handedness::Right),
        )
    }
}

impl HandTrackingSubsystem for SnapshotSubsystem {
    type Hand = HandSnapshot;

    fn left_hand(&self) -> &HandSnapshot {
        &self.left
    }

    fn right_hand(&self) -> &HandSnapshot {
        &self.right
    }
}
