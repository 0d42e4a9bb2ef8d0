use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use pcap::{Capture, Offline};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture file '{0}' not found")]
    FileNotFound(String),

    #[error("Failed to open capture file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: pcap::Error,
    },

    #[error("Failed to read packet from '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: pcap::Error,
    },
}

/// Raw per-packet timestamp as stored in the capture record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffTime {
    pub secs: i64,
    pub micros: i64,
}

impl SniffTime {
    pub fn new(secs: i64, micros: i64) -> Self {
        Self { secs, micros }
    }

    /// `None` when the microsecond part is out of range or the instant is
    /// outside what chrono can represent.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !(0..1_000_000).contains(&self.micros) {
            return None;
        }
        DateTime::from_timestamp(self.secs, (self.micros * 1_000) as u32)
    }
}

impl fmt::Display for SniffTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}

/// Data link of a capture file, keyed by the DLT value libpcap reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    LinuxSll,
    RawIp,
    Loopback,
    Other(i32),
}

impl LinkType {
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkType::Ethernet,
            113 => LinkType::LinuxSll,
            // DLT_RAW differs per platform; 101/228/229 are the file-level values
            12 | 14 | 101 | 228 | 229 => LinkType::RawIp,
            0 | 108 => LinkType::Loopback,
            other => LinkType::Other(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedPacket {
    pub timestamp: SniffTime,
    pub link_type: LinkType,
    /// Length of the packet on the wire, which may exceed `data.len()`.
    pub wire_len: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ReaderStats {
    pub packets_read: u64,
    pub bytes_read: u64,
}

/// Forward-only reader over an offline capture file.
///
/// Yields one item per packet in capture order and stops for good at the
/// end of the file or after the first read error.
pub struct CaptureReader {
    capture: Capture<Offline>,
    path: PathBuf,
    link_type: LinkType,
    stats: ReaderStats,
    finished: bool,
}

impl CaptureReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CaptureError::FileNotFound(path.display().to_string()));
        }

        let capture = Capture::from_file(path).map_err(|source| CaptureError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        info!("Opened capture file {} (link type {:?})", path.display(), link_type);

        Ok(CaptureReader {
            capture,
            path: path.to_path_buf(),
            link_type,
            stats: ReaderStats::default(),
            finished: false,
        })
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }
}

impl Iterator for CaptureReader {
    type Item = Result<DecodedPacket, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.capture.next_packet() {
            Ok(packet) => {
                self.stats.packets_read += 1;
                self.stats.bytes_read += packet.data.len() as u64;

                Some(Ok(DecodedPacket {
                    timestamp: SniffTime::new(
                        packet.header.ts.tv_sec as i64,
                        packet.header.ts.tv_usec as i64,
                    ),
                    link_type: self.link_type,
                    wire_len: packet.header.len,
                    data: packet.data.to_vec(),
                }))
            }
            Err(pcap::Error::NoMorePackets) => {
                self.finished = true;
                None
            }
            Err(source) => {
                self.finished = true;
                Some(Err(CaptureError::Read {
                    path: self.path.display().to_string(),
                    source,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::test_support::{ipv4_frame, truncate_tail, write_pcap, TestPacket, IPPROTO_TCP};

    #[test]
    fn test_sniff_time_conversion() {
        let ts = SniffTime::new(1_700_000_000, 250_000);
        let dt = ts.to_datetime().unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_micros(), 250_000);

        assert!(SniffTime::new(0, 1_000_000).to_datetime().is_none());
        assert!(SniffTime::new(0, -1).to_datetime().is_none());
        assert!(SniffTime::new(i64::MAX, 0).to_datetime().is_none());
    }

    #[test]
    fn test_link_type_mapping() {
        assert_eq!(LinkType::from_dlt(1), LinkType::Ethernet);
        assert_eq!(LinkType::from_dlt(113), LinkType::LinuxSll);
        assert_eq!(LinkType::from_dlt(12), LinkType::RawIp);
        assert_eq!(LinkType::from_dlt(0), LinkType::Loopback);
        assert_eq!(LinkType::from_dlt(105), LinkType::Other(105));
    }

    #[test]
    fn test_missing_file() {
        let result = CaptureReader::open("/nonexistent/dir/capture.pcap");
        assert!(matches!(result, Err(CaptureError::FileNotFound(_))));
    }

    #[test]
    fn test_reads_packets_in_order() {
        let frame = ipv4_frame([10, 0, 0, 1], [10, 0, 0, 2], IPPROTO_TCP);
        let path = write_pcap(
            "reader-order",
            1,
            &[
                TestPacket::new(100, 5, frame.clone()),
                TestPacket::new(101, 0, frame.clone()).with_wire_len(1500),
            ],
        );

        let mut reader = CaptureReader::open(&path).unwrap();
        assert_eq!(reader.link_type(), LinkType::Ethernet);

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.timestamp, SniffTime::new(100, 5));
        assert_eq!(first.wire_len as usize, frame.len());
        assert_eq!(first.data, frame);

        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.timestamp, SniffTime::new(101, 0));
        assert_eq!(second.wire_len, 1500);

        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert_eq!(reader.stats().packets_read, 2);
        assert_eq!(reader.stats().bytes_read, 2 * frame.len() as u64);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_truncated_record_ends_with_read_error() {
        let frame = ipv4_frame([10, 0, 0, 1], [10, 0, 0, 2], IPPROTO_TCP);
        let path = write_pcap(
            "reader-truncated",
            1,
            &[
                TestPacket::new(100, 0, frame.clone()),
                TestPacket::new(101, 0, frame.clone()),
            ],
        );
        truncate_tail(&path, 5);

        let mut reader = CaptureReader::open(&path).unwrap();
        assert!(matches!(reader.next(), Some(Ok(_))));
        assert!(matches!(reader.next(), Some(Err(CaptureError::Read { .. }))));
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert_eq!(reader.stats().packets_read, 1);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_empty_capture() {
        let path = write_pcap("reader-empty", 1, &[]);
        let reader = CaptureReader::open(&path).unwrap();
        assert_eq!(reader.count(), 0);
        let _ = std::fs::remove_file(path);
    }
}
