// Library exports for capture-report
pub mod analysis;
pub mod capture;
pub mod config;
pub mod pipeline;
pub mod traffic;
pub mod ui;
pub mod utils;
pub mod visualization;

pub use analysis::{statistics, table};
pub use capture::pcap_reader;
pub use config::settings;
pub use traffic::{extractor, record};
pub use ui::app;
pub use utils::formatting;
pub use visualization::{charts, ranking, scatter};

// Error types
pub use anyhow::{Error, Result};
