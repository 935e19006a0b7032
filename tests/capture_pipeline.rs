use std::sync::Arc;

use manoscopio::csv_loader::load_samples_from_csv;
use manoscopio::feature_builder::{FeatureVectorBuilder, HandStatus};
use manoscopio::gesture_classifier::{
    ArgmaxAboveThreshold, ClassifierError, GestureClassifier, ScoreModel, DEFAULT_LABELS,
};
use manoscopio::gesture_detector::{DetectorMode, FrameOutcome, GestureDetector, TextLabel};
use manoscopio::hand_tracking::{HandSnapshot, SnapshotSubsystem};
use manoscopio::sample_recorder::SampleRecorder;
use manoscopio::types::{
    FingerId, FingerShape, Handedness, Quaternion, FEATURES_PER_HAND, TOTAL_FEATURES,
};
use tempfile::tempdir;

/// Puntúa según el primer valor del vector (el eje X de la palma izquierda)
struct PalmPitchModel;

impl ScoreModel for PalmPitchModel {
    fn input_len(&self) -> Option<usize> {
        Some(TOTAL_FEATURES)
    }

    fn output_len(&self) -> Option<usize> {
        Some(DEFAULT_LABELS.len())
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        let mut logits = vec![0.0; DEFAULT_LABELS.len()];
        let class = if input[0] > 180.0 { 3 } else { 1 };
        logits[class] = 8.0;
        Ok(logits)
    }
}

fn left_hand(pitch_deg: f32) -> HandSnapshot {
    HandSnapshot::new(Handedness::Left)
        .with_palm(Quaternion::from_axis_angle_deg([1.0, 0.0, 0.0], pitch_deg))
        .with_finger(FingerId::Thumb, FingerShape::all(0.5, 0.25, 0.125, 0.0, 1.0))
}

fn frame(left: HandSnapshot, right: HandSnapshot) -> SnapshotSubsystem {
    SnapshotSubsystem::new(left, right)
}

#[tokio::test]
async fn training_session_appends_usable_frames() {
    let dir = tempdir().unwrap();
    let points = dir.path().join("data/points.csv");
    let recorder = SampleRecorder::new(&points, true);
    let mut detector =
        GestureDetector::new(FeatureVectorBuilder::default(), recorder, None, TextLabel::default())
            .unwrap();
    detector.set_class_id(1);
    assert_eq!(detector.mode(), DetectorMode::Training);

    let frames = [
        Some(frame(left_hand(30.0), HandSnapshot::new(Handedness::Right))),
        None,
        // Palma en identidad: centinela de "sin datos"
        Some(frame(
            HandSnapshot::new(Handedness::Left).with_palm(Quaternion::identity()),
            HandSnapshot::new(Handedness::Right),
        )),
        Some(frame(
            left_hand(45.0),
            HandSnapshot::new(Handedness::Right)
                .with_palm(Quaternion::from_axis_angle_deg([0.0, 0.0, 1.0], 90.0)),
        )),
    ];

    let mut outcomes = Vec::new();
    for subsystem in &frames {
        outcomes.push(detector.late_update(subsystem.as_ref()).await.unwrap());
    }

    assert_eq!(outcomes[0], FrameOutcome::Recorded { class_id: 1 });
    assert_eq!(outcomes[1], FrameOutcome::NoSubsystem);
    assert_eq!(
        outcomes[2],
        FrameOutcome::NoData {
            left: HandStatus::ZeroRotation,
            right: HandStatus::PoseUnavailable
        }
    );
    assert_eq!(outcomes[3], FrameOutcome::Recorded { class_id: 1 });

    assert_eq!(detector.stop_training().unwrap(), 2);

    let samples = load_samples_from_csv(&points, Some(TOTAL_FEATURES)).unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.class_id == 1));

    let first = samples[0].features.as_slice();
    assert!((first[0] - 30.0).abs() < 1e-3);
    // Pulgar izquierdo justo después de la rotación
    assert_eq!(&first[3..8], &[0.5, 0.25, 0.125, 0.0, 1.0]);
    // Mano derecha sin pose: bloque a cero
    assert!(first[FEATURES_PER_HAND..].iter().all(|&v| v == 0.0));

    let second = samples[1].features.as_slice();
    assert!((second[FEATURES_PER_HAND + 2] - 90.0).abs() < 1e-3);

    // Una segunda sesión añade, no sobrescribe
    detector.set_class_id(2);
    detector.start_training();
    detector
        .late_update(Some(&frame(left_hand(60.0), HandSnapshot::new(Handedness::Right))))
        .await
        .unwrap();
    assert_eq!(detector.stop_training().unwrap(), 1);

    let samples = load_samples_from_csv(&points, Some(TOTAL_FEATURES)).unwrap();
    assert_eq!(
        samples.iter().map(|s| s.class_id).collect::<Vec<_>>(),
        vec![1, 1, 2]
    );
}

#[tokio::test]
async fn inference_session_labels_each_frame() {
    let dir = tempdir().unwrap();
    let recorder = SampleRecorder::new(dir.path().join("points.csv"), false);
    let classifier = GestureClassifier::from_model(
        PalmPitchModel,
        DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        TOTAL_FEATURES,
        Box::new(ArgmaxAboveThreshold { threshold: 0.8 }),
    )
    .unwrap();
    let classifier = Arc::new(classifier);
    let mut detector = GestureDetector::new(
        FeatureVectorBuilder::default(),
        recorder,
        Some(Arc::clone(&classifier)),
        TextLabel::default(),
    )
    .unwrap();
    assert_eq!(detector.mode(), DetectorMode::Inference);

    let outcome = detector
        .late_update(Some(&frame(left_hand(20.0), HandSnapshot::new(Handedness::Right))))
        .await
        .unwrap();
    assert!(matches!(outcome, FrameOutcome::Classified(ref r) if r.class_index == Some(1)));
    assert_eq!(detector.result_label().text(), "Love");

    // -60° alrededor de X da 300
    detector
        .late_update(Some(&frame(left_hand(-60.0), HandSnapshot::new(Handedness::Right))))
        .await
        .unwrap();
    assert_eq!(detector.result_label().text(), "6");

    // Un frame sin datos no toca la etiqueta
    let outcome = detector
        .late_update(Some(&SnapshotSubsystem::default()))
        .await
        .unwrap();
    assert!(matches!(outcome, FrameOutcome::NoData { .. }));
    assert_eq!(detector.result_label().text(), "6");

    let stats = classifier.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.skipped, 0);
    assert_eq!(detector.recorder().pending(), 0);
}

#[tokio::test]
async fn mismatched_layout_is_rejected() {
    let dir = tempdir().unwrap();
    let recorder = SampleRecorder::new(dir.path().join("points.csv"), false);
    let classifier = GestureClassifier::from_model(
        PalmPitchModel,
        DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        TOTAL_FEATURES,
        Box::new(ArgmaxAboveThreshold { threshold: 0.8 }),
    )
    .unwrap();

    let layout = manoscopio::types::FeatureLayout::new(
        vec![FingerId::Thumb],
        manoscopio::types::ShapeMeasure::ALL.to_vec(),
    );
    let result = GestureDetector::new(
        FeatureVectorBuilder::new(layout),
        recorder,
        Some(Arc::new(classifier)),
        TextLabel::default(),
    );
    assert!(result.is_err());
}
