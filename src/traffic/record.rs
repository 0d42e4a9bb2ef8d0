use crate::capture::SniffTime;

/// Flat per-packet record kept for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub timestamp: SniffTime,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub protocol: String,
    pub length: u64,
}

impl PacketRecord {
    pub fn new(
        timestamp: SniffTime,
        source: Option<String>,
        destination: Option<String>,
        protocol: impl Into<String>,
        length: u64,
    ) -> Self {
        Self {
            timestamp,
            source,
            destination,
            protocol: protocol.into(),
            length,
        }
    }
}
