pub mod charts;
pub mod ranking;
pub mod scatter;

pub use charts::{LengthHistogramChart, PerMinuteChart, ProtocolPieChart};
pub use ranking::write_top_talkers;
pub use scatter::{open_in_browser, render_html, write_html, PresentError, ScatterData};
