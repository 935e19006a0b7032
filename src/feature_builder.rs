use log::trace;

use crate::hand_tracking::{HandTrackingSubsystem, TrackedHand};
use crate::types::{FeatureLayout, FeatureVector, LabeledSample};

/// Estado de un bloque de mano tras construir el vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandStatus {
    /// Rotación de palma y dedos escritos en el bloque
    Populated,
    /// El proveedor no tiene pose para la palma
    PoseUnavailable,
    /// La palma resolvió exactamente a rotación cero (centinela "sin datos")
    ZeroRotation,
    /// Mano sin lateralidad válida, no tiene bloque asignado
    InvalidHandedness,
}

impl HandStatus {
    pub fn is_populated(self) -> bool {
        self == HandStatus::Populated
    }
}

/// Resultado de un frame: el vector más el estado de cada mano consultada
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub features: FeatureVector,
    pub left: HandStatus,
    pub right: HandStatus,
}

impl FeatureFrame {
    /// Al menos una mano llegó a escribir su bloque
    pub fn has_data(&self) -> bool {
        self.left.is_populated() || self.right.is_populated()
    }

    /// Regla heredada: un vector que suma exactamente cero se trata como "sin tracking"
    pub fn sums_to_zero(&self) -> bool {
        self.features.sum() == 0.0
    }

    /// El frame merece procesarse (grabar o clasificar)
    pub fn is_usable(&self) -> bool {
        self.has_data() && !self.sums_to_zero()
    }

    pub fn labeled(&self, class_id: i32) -> LabeledSample {
        LabeledSample {
            class_id,
            features: self.features.clone(),
        }
    }
}

/// Convierte las dos manos de un frame en un vector plano de longitud fija
pub struct FeatureVectorBuilder {
    layout: FeatureLayout,
}

impl FeatureVectorBuilder {
    pub fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Longitud del vector que produce `build`
    pub fn feature_len(&self) -> usize {
        self.layout.len()
    }

    pub fn build<S: HandTrackingSubsystem>(&self, subsystem: &S) -> FeatureFrame {
        let mut features = FeatureVector::zeros(self.layout.len());
        let left = self.write_hand(subsystem.left_hand(), features.as_mut_slice());
        let right = self.write_hand(subsystem.right_hand(), features.as_mut_slice());

        FeatureFrame {
            features,
            left,
            right,
        }
    }

    /// Escribe el bloque de una mano en `out`. Si la palma no está lista el bloque
    /// queda intacto (a cero) y se informa el motivo.
    pub fn write_hand<H: TrackedHand>(&self, hand: &H, out: &mut [f32]) -> HandStatus {
        let Some(offset) = self.layout.hand_offset(hand.handedness()) else {
            return HandStatus::InvalidHandedness;
        };

        let Some(rotation) = hand.palm_rotation() else {
            trace!("Mano {:?}: palma sin pose", hand.handedness());
            return HandStatus::PoseUnavailable;
        };

        let euler = rotation.to_euler_degrees();
        if euler == [0.0, 0.0, 0.0] {
            trace!("Mano {:?}: rotación de palma cero", hand.handedness());
            return HandStatus::ZeroRotation;
        }

        out[offset..offset + 3].copy_from_slice(&euler);

        for (finger_pos, &finger) in self.layout.fingers.iter().enumerate() {
            let shape = hand.finger_shape(finger);
            for (measure_pos, &measure) in self.layout.measures.iter().enumerate() {
                // Medida no disponible: se codifica como 0.0, sin error
                let value = shape.get(measure).unwrap_or(0.0);
                out[self.layout.measure_slot(offset, finger_pos, measure_pos)] = value;
            }
        }

        HandStatus::Populated
    }
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new(FeatureLayout::default())
    }
}
