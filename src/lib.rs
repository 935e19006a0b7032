pub mod assets;
pub mod config;
pub mod csv_loader;
pub mod debug_display;
pub mod feature_builder;
pub mod gesture_classifier;
pub mod gesture_detector;
pub mod hand_tracking;
pub mod logging;
pub mod sample_recorder;
pub mod types;
