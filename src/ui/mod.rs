pub mod app;

pub use app::ChartViewer;
