use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::capture::SniffTime;
use crate::traffic::PacketRecord;

#[derive(Error, Debug, PartialEq)]
pub enum AnalysisError {
    #[error("Packet timestamp {0} cannot be converted to a date/time")]
    InvalidTimestamp(SniffTime),

    #[error("Resampling interval must be a positive number of seconds, got {0}")]
    InvalidInterval(i64),

    #[error("Histogram needs at least one bin")]
    InvalidBinCount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub timestamp: DateTime<Utc>,
    pub record: PacketRecord,
}

/// All extracted records, ordered by timestamp.
#[derive(Debug, Clone, Default)]
pub struct PacketTable {
    rows: Vec<TableRow>,
}

impl PacketTable {
    /// Materializes the records and indexes them by timestamp.
    ///
    /// Every timestamp must convert; the first one that does not fails the load.
    /// Records sharing a timestamp keep their capture order.
    pub fn load<I>(records: I) -> Result<Self, AnalysisError>
    where
        I: IntoIterator<Item = PacketRecord>,
    {
        let mut rows = records
            .into_iter()
            .map(|record| {
                let timestamp = record
                    .timestamp
                    .to_datetime()
                    .ok_or(AnalysisError::InvalidTimestamp(record.timestamp))?;
                Ok(TableRow { timestamp, record })
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        rows.sort_by_key(|row| row.timestamp);
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(|row| row.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(|row| row.timestamp)
    }

    pub fn total_bytes(&self) -> u64 {
        self.rows.iter().map(|row| row.record.length).sum()
    }

    pub fn sources(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(|row| row.record.source.as_deref())
    }

    pub fn destinations(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(|row| row.record.destination.as_deref())
    }

    pub fn protocols(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(|row| row.record.protocol.as_str())
    }

    pub fn lengths(&self) -> Vec<u64> {
        self.rows.iter().map(|row| row.record.length).collect()
    }
}
