// Helpers for building small capture files in tests.
use std::path::{Path, PathBuf};

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
pub const IPPROTO_SCTP: u8 = 132;

pub struct TestPacket {
    pub secs: u32,
    pub micros: u32,
    pub data: Vec<u8>,
    pub wire_len: u32,
}

impl TestPacket {
    pub fn new(secs: u32, micros: u32, data: Vec<u8>) -> Self {
        let wire_len = data.len() as u32;
        Self { secs, micros, data, wire_len }
    }

    pub fn with_wire_len(mut self, wire_len: u32) -> Self {
        self.wire_len = wire_len;
        self
    }
}

/// Writes a classic little-endian pcap file into the temp dir.
pub fn write_pcap(name: &str, linktype: u32, packets: &[TestPacket]) -> PathBuf {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&0i32.to_le_bytes()); // thiszone
    bytes.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
    bytes.extend_from_slice(&65_535u32.to_le_bytes());
    bytes.extend_from_slice(&linktype.to_le_bytes());

    for packet in packets {
        bytes.extend_from_slice(&packet.secs.to_le_bytes());
        bytes.extend_from_slice(&packet.micros.to_le_bytes());
        bytes.extend_from_slice(&(packet.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&packet.wire_len.to_le_bytes());
        bytes.extend_from_slice(&packet.data);
    }

    let path = std::env::temp_dir().join(format!(
        "capture-report-{}-{}.pcap",
        std::process::id(),
        name
    ));
    std::fs::write(&path, bytes).expect("write test capture");
    path
}

/// Cuts the last `bytes` bytes off a capture file, leaving a short final record.
pub fn truncate_tail(path: &Path, bytes: usize) {
    let mut contents = std::fs::read(path).expect("read test capture");
    let keep = contents.len().saturating_sub(bytes);
    contents.truncate(keep);
    std::fs::write(path, contents).expect("rewrite test capture");
}

fn ethernet_header(ethertype: u16) -> Vec<u8> {
    let mut frame = vec![0x02, 0x00, 0x00, 0x00, 0x00, 0x02]; // dst mac
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]); // src mac
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame
}

/// IPv4 header followed by a zeroed 20 byte transport header.
pub fn ipv4_packet(src: [u8; 4], dst: [u8; 4], protocol: u8) -> Vec<u8> {
    let payload_len = 20u16;
    let total_len = 20 + payload_len;
    let mut packet = vec![0x45, 0x00];
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 64, protocol, 0x00, 0x00]);
    packet.extend_from_slice(&src);
    packet.extend_from_slice(&dst);
    packet.extend(std::iter::repeat(0u8).take(payload_len as usize));
    packet
}

pub fn ipv6_packet(src: [u8; 16], dst: [u8; 16], next_header: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0x60, 0x00, 0x00, 0x00];
    packet.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    packet.push(next_header);
    packet.push(64);
    packet.extend_from_slice(&src);
    packet.extend_from_slice(&dst);
    packet.extend_from_slice(payload);
    packet
}

pub fn ipv4_frame(src: [u8; 4], dst: [u8; 4], protocol: u8) -> Vec<u8> {
    let mut frame = ethernet_header(0x0800);
    frame.extend(ipv4_packet(src, dst, protocol));
    frame
}

pub fn ipv6_frame(src: [u8; 16], dst: [u8; 16], next_header: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = ethernet_header(0x86dd);
    frame.extend(ipv6_packet(src, dst, next_header, payload));
    frame
}

pub fn vlan_ipv4_frame(vlan_id: u16, src: [u8; 4], dst: [u8; 4], protocol: u8) -> Vec<u8> {
    let mut frame = ethernet_header(0x8100);
    frame.extend_from_slice(&(vlan_id & 0x0fff).to_be_bytes());
    frame.extend_from_slice(&0x0800u16.to_be_bytes());
    frame.extend(ipv4_packet(src, dst, protocol));
    frame
}

pub fn arp_frame() -> Vec<u8> {
    let mut frame = ethernet_header(0x0806);
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
    frame.extend(std::iter::repeat(0u8).take(20));
    frame
}

/// Linux cooked capture (SLL) header carrying an IPv4 packet.
pub fn sll_ipv4_frame(src: [u8; 4], dst: [u8; 4], protocol: u8) -> Vec<u8> {
    let mut frame = vec![0x00, 0x00, 0x00, 0x01, 0x00, 0x06];
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00]);
    frame.extend_from_slice(&0x0800u16.to_be_bytes());
    frame.extend(ipv4_packet(src, dst, protocol));
    frame
}

/// BSD loopback header (AF_INET in host order) carrying an IPv4 packet.
pub fn loopback_ipv4_frame(src: [u8; 4], dst: [u8; 4], protocol: u8) -> Vec<u8> {
    let mut frame = 2u32.to_le_bytes().to_vec();
    frame.extend(ipv4_packet(src, dst, protocol));
    frame
}
