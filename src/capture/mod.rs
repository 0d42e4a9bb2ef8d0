pub mod pcap_reader;

#[cfg(test)]
pub(crate) mod test_support;

pub use pcap_reader::{CaptureError, CaptureReader, DecodedPacket, LinkType, ReaderStats, SniffTime};
