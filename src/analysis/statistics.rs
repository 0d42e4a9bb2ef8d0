use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::analysis::table::{AnalysisError, PacketTable};
use crate::capture::SniffTime;
use crate::config::AnalysisConfig;

/// Window count above which a capture is reported as unusually sparse.
pub const LARGE_WINDOW_SPAN: usize = 100_000;

/// Packet count for one resampling window `[start, start + interval)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().map(|bin| bin.count).sum()
    }

    pub fn max_count(&self) -> u64 {
        self.bins.iter().map(|bin| bin.count).max().unwrap_or(0)
    }

    pub fn bin_width(&self) -> Option<f64> {
        self.bins.first().map(|bin| bin.upper - bin.lower)
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.bins.first(), self.bins.last()) {
            (Some(first), Some(last)) => Some((first.lower, last.upper)),
            _ => None,
        }
    }
}

/// Counts rows per fixed window, windows aligned to multiples of the
/// interval since the Unix epoch. Empty windows between the first and last
/// packet are kept with a zero count.
pub fn resample_counts(table: &PacketTable, interval_secs: i64) -> Result<Vec<TimeBucket>, AnalysisError> {
    if interval_secs <= 0 {
        return Err(AnalysisError::InvalidInterval(interval_secs));
    }

    let (first, last) = match (table.first_timestamp(), table.last_timestamp()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(Vec::new()),
    };

    let first_window = first.timestamp().div_euclid(interval_secs);
    let last_window = last.timestamp().div_euclid(interval_secs);

    let span = (last_window - first_window + 1) as usize;
    if span > LARGE_WINDOW_SPAN {
        warn!(
            "Capture spans {} windows of {}s ({} to {}), most of them will be empty",
            span, interval_secs, first, last
        );
    }

    let mut counts = vec![0u64; span];
    for row in table.rows() {
        let window = row.timestamp.timestamp().div_euclid(interval_secs);
        counts[(window - first_window) as usize] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(offset, count)| {
            let start_secs = (first_window + offset as i64) * interval_secs;
            DateTime::from_timestamp(start_secs, 0)
                .map(|start| TimeBucket { start, count })
                .ok_or(AnalysisError::InvalidTimestamp(SniffTime::new(start_secs, 0)))
        })
        .collect()
}

/// Frequency of each non-null value, highest count first.
/// Ties keep the order in which values were first seen.
pub fn value_counts<'a, I>(values: I) -> Vec<ValueCount>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();

    for value in values.into_iter().flatten() {
        match index.get(value) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(value, counts.len());
                counts.push(ValueCount {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, first-seen order survives among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

pub fn top_n(mut counts: Vec<ValueCount>, n: usize) -> Vec<ValueCount> {
    counts.truncate(n);
    counts
}

/// Equal-width histogram over `[min, max]`.
///
/// Bins are half-open except the last one, which also takes the maximum.
/// A single distinct value widens the range by 0.5 on both sides.
pub fn histogram(values: &[u64], bins: usize) -> Result<Histogram, AnalysisError> {
    if bins == 0 {
        return Err(AnalysisError::InvalidBinCount);
    }

    let (min, max) = match (values.iter().min(), values.iter().max()) {
        (Some(&min), Some(&max)) => (min as f64, max as f64),
        _ => return Ok(Histogram::default()),
    };

    let (lower, upper) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (upper - lower) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { upper } else { lower + i as f64 * width })
        .collect();

    let mut counts = vec![0u64; bins];
    for &value in values {
        let value = value as f64;
        let mut index = (((value - lower) / width) as usize).min(bins - 1);
        // the division can land one bin off an exact edge
        if value < edges[index] {
            index -= 1;
        } else if index + 1 < bins && value >= edges[index + 1] {
            index += 1;
        }
        counts[index] += 1;
    }

    let bins = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: edges[i],
            upper: edges[i + 1],
            count,
        })
        .collect();

    Ok(Histogram { bins })
}

/// Every aggregate view of one capture, computed once.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficReport {
    pub total_records: usize,
    pub total_bytes: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub interval_secs: i64,
    pub packets_per_interval: Vec<TimeBucket>,
    pub top_sources: Vec<ValueCount>,
    pub top_destinations: Vec<ValueCount>,
    pub protocols: Vec<ValueCount>,
    pub length_histogram: Histogram,
}

impl TrafficReport {
    pub fn build(table: &PacketTable, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            total_records: table.len(),
            total_bytes: table.total_bytes(),
            first_seen: table.first_timestamp(),
            last_seen: table.last_timestamp(),
            interval_secs: config.resample_interval_secs,
            packets_per_interval: resample_counts(table, config.resample_interval_secs)?,
            top_sources: top_n(value_counts(table.sources()), config.top_n),
            top_destinations: top_n(value_counts(table.destinations()), config.top_n),
            protocols: value_counts(table.protocols().map(Some)),
            length_histogram: histogram(&table.lengths(), config.histogram_bins)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.total_records == 0
    }

    pub fn protocol_percentage(&self, protocol: &str) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.protocols
            .iter()
            .find(|entry| entry.value == protocol)
            .map(|entry| (entry.count as f64 / self.total_records as f64) * 100.0)
            .unwrap_or(0.0)
    }
}
