//! Visualización de depuración de la forma de los dedos.
//!
//! Cada frame empuja las 5 medidas de los 5 dedos de una mano a un sumidero de
//! UI. Una medida no disponible se oculta, que no es lo mismo que mostrar cero.

use log::{debug, warn};

use crate::hand_tracking::{HandTrackingSubsystem, TrackedHand};
use crate::types::{FingerId, FingerShape, Handedness, ShapeMeasure, NUM_FINGERS, NUM_MEASURES};

/// Sumidero de UI con un gráfico por dedo
pub trait FingerShapeDisplay {
    fn set_finger_name(&mut self, finger_index: usize, name: &str);
    fn set_shape(&mut self, finger_index: usize, measure: ShapeMeasure, value: f32);
    fn hide_shape(&mut self, finger_index: usize, measure: ShapeMeasure);
}

/// Estado de un slot de medida
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DisplaySlot {
    #[default]
    Hidden,
    Value(f32),
}

/// Tablero en memoria: guarda el último valor de cada slot
#[derive(Debug, Clone, Default)]
pub struct SlotBoard {
    names: [String; NUM_FINGERS],
    slots: [[DisplaySlot; NUM_MEASURES]; NUM_FINGERS],
    updates: u64,
}

impl SlotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finger_name(&self, finger_index: usize) -> Option<&str> {
        self.names.get(finger_index).map(String::as_str)
    }

    pub fn slot(&self, finger_index: usize, measure: ShapeMeasure) -> Option<DisplaySlot> {
        self.slots
            .get(finger_index)
            .map(|row| row[measure.index()])
    }

    /// Total de llamadas set/hide recibidas
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Línea de texto "Thumb: 0:0.50, 1:-, ..." para un dedo
    pub fn render_line(&self, finger_index: usize) -> String {
        let Some(row) = self.slots.get(finger_index) else {
            return String::new();
        };
        let values: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                DisplaySlot::Value(v) => format!("{}:{:.2}", i, v),
                DisplaySlot::Hidden => format!("{}:-", i),
            })
            .collect();
        format!("{}: {}", self.names[finger_index], values.join(", "))
    }
}

impl FingerShapeDisplay for SlotBoard {
    fn set_finger_name(&mut self, finger_index: usize, name: &str) {
        if let Some(slot) = self.names.get_mut(finger_index) {
            *slot = name.to_string();
        }
    }

    fn set_shape(&mut self, finger_index: usize, measure: ShapeMeasure, value: f32) {
        if let Some(row) = self.slots.get_mut(finger_index) {
            row[measure.index()] = DisplaySlot::Value(value);
            self.updates += 1;
        }
    }

    fn hide_shape(&mut self, finger_index: usize, measure: ShapeMeasure) {
        if let Some(row) = self.slots.get_mut(finger_index) {
            row[measure.index()] = DisplaySlot::Hidden;
            self.updates += 1;
        }
    }
}

/// Empuja la forma de los dedos de una mano a un `FingerShapeDisplay`
pub struct DebugDisplayAdapter<D: FingerShapeDisplay> {
    handedness: Handedness,
    display: D,
    warned_no_subsystem: bool,
}

impl<D: FingerShapeDisplay> DebugDisplayAdapter<D> {
    pub fn new(handedness: Handedness, display: D) -> Self {
        let handedness = if handedness == Handedness::Invalid {
            warn!("Lateralidad Invalid en la visualización de dedos, se usa Right");
            Handedness::Right
        } else {
            handedness
        };

        Self {
            handedness,
            display,
            warned_no_subsystem: false,
        }
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Inicializa el nombre de cada gráfico; se llama una vez al arrancar
    pub fn start(&mut self) {
        for finger in FingerId::ALL {
            self.display.set_finger_name(finger.index(), finger.name());
        }
    }

    /// Actualiza los 25 slots con la mano configurada. Devuelve `false` si no
    /// hay subsistema en este frame.
    pub fn update<S: HandTrackingSubsystem>(&mut self, subsystem: Option<&S>) -> bool {
        let Some(subsystem) = subsystem else {
            if !self.warned_no_subsystem {
                warn!("No hay subsistema de hand tracking registrado");
                self.warned_no_subsystem = true;
            }
            return false;
        };
        self.warned_no_subsystem = false;

        let Some(hand) = subsystem.hand(self.handedness) else {
            return false;
        };

        match hand.palm_rotation() {
            Some(rotation) => debug!(
                "{:?}: palma {:?}",
                self.handedness,
                rotation.to_euler_degrees()
            ),
            None => debug!("{:?}: palma sin pose", self.handedness),
        }

        for finger in FingerId::ALL {
            let shape = hand.finger_shape(finger);
            self.update_finger(finger.index(), &shape);
        }
        true
    }

    fn update_finger(&mut self, finger_index: usize, shape: &FingerShape) {
        let mut shown = Vec::with_capacity(NUM_MEASURES);
        for measure in ShapeMeasure::ALL {
            match shape.get(measure) {
                Some(value) => {
                    self.display.set_shape(finger_index, measure, value);
                    shown.push(format!("{}:{}", measure.index(), value));
                }
                None => self.display.hide_shape(finger_index, measure),
            }
        }
        debug!("{}: {}", finger_index, shown.join(", "));
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand_tracking::{HandSnapshot, SnapshotSubsystem};
    use crate::types::Quaternion;

    fn subsystem_with_right_thumb(shape: FingerShape) -> SnapshotSubsystem {
        let right = HandSnapshot::new(Handedness::Right)
            .with_palm(Quaternion::identity())
            .with_finger(FingerId::Thumb, shape);
        SnapshotSubsystem::new(HandSnapshot::new(Handedness::Left), right)
    }

    #[test]
    fn test_start_names_every_finger() {
        let mut adapter = DebugDisplayAdapter::new(Handedness::Left, SlotBoard::new());
        adapter.start();
        assert_eq!(adapter.display().finger_name(0), Some("Thumb"));
        assert_eq!(adapter.display().finger_name(4), Some("Little"));
    }

    #[test]
    fn test_invalid_handedness_defaults_to_right() {
        let adapter = DebugDisplayAdapter::new(Handedness::Invalid, SlotBoard::new());
        assert_eq!(adapter.handedness(), Handedness::Right);
    }

    #[test]
    fn test_update_sets_and_hides_slots() {
        let mut adapter = DebugDisplayAdapter::new(Handedness::Right, SlotBoard::new());
        adapter.start();
        let subsystem = subsystem_with_right_thumb(FingerShape {
            full_curl: Some(0.0),
            pinch: Some(0.75),
            ..FingerShape::default()
        });

        assert!(adapter.update(Some(&subsystem)));

        let board = adapter.display();
        assert_eq!(board.updates(), 25);
        // Cero visible, distinto de oculto
        assert_eq!(
            board.slot(0, ShapeMeasure::FullCurl),
            Some(DisplaySlot::Value(0.0))
        );
        assert_eq!(board.slot(0, ShapeMeasure::BaseCurl), Some(DisplaySlot::Hidden));
        assert_eq!(
            board.slot(0, ShapeMeasure::Pinch),
            Some(DisplaySlot::Value(0.75))
        );
        assert_eq!(board.render_line(0), "Thumb: 0:0.00, 1:-, 2:-, 3:0.75, 4:-");
    }

    #[test]
    fn test_last_value_wins() {
        let mut adapter = DebugDisplayAdapter::new(Handedness::Right, SlotBoard::new());
        let first = subsystem_with_right_thumb(FingerShape::all(0.1, 0.1, 0.1, 0.1, 0.1));
        let second = subsystem_with_right_thumb(FingerShape {
            tip_curl: Some(0.9),
            ..FingerShape::default()
        });

        adapter.update(Some(&first));
        adapter.update(Some(&second));

        let board = adapter.display();
        assert_eq!(board.slot(0, ShapeMeasure::FullCurl), Some(DisplaySlot::Hidden));
        assert_eq!(
            board.slot(0, ShapeMeasure::TipCurl),
            Some(DisplaySlot::Value(0.9))
        );
    }

    #[test]
    fn test_missing_subsystem_is_noop() {
        let mut adapter = DebugDisplayAdapter::new(Handedness::Right, SlotBoard::new());
        assert!(!adapter.update::<SnapshotSubsystem>(None));
        assert!(!adapter.update::<SnapshotSubsystem>(None));
        assert_eq!(adapter.display().updates(), 0);
    }
}
