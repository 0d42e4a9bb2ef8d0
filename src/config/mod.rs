pub mod settings;

pub use settings::{AnalysisConfig, CaptureConfig, Config, OutputConfig};
