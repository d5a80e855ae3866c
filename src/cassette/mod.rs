//! Record/replay infrastructure for deterministic testing.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;

/// Port name under which generator calls are recorded.
pub const GENERATOR_PORT: &str = "image_generator";
/// Method name of a recorded generator call.
pub const GENERATE_METHOD: &str = "generate";
