pub mod formatting;

pub use formatting::{format_bandwidth, format_bytes, format_duration, truncate_string};
