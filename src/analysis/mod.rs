pub mod statistics;
pub mod table;

pub use statistics::{
    histogram, resample_counts, top_n, value_counts, Histogram, HistogramBin, TimeBucket, TrafficReport,
    ValueCount,
};
pub use table::{AnalysisError, PacketTable, TableRow};
