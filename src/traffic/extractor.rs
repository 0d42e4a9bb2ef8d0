use std::net::IpAddr;

use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::sll::SLLPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet;

use crate::capture::{CaptureError, DecodedPacket, LinkType};
use crate::traffic::record::PacketRecord;

// IPv6 extension headers walked before the transport header
const IPV6_HOP_BY_HOP: u8 = 0;
const IPV6_ROUTING: u8 = 43;
const IPV6_FRAGMENT: u8 = 44;
const IPV6_DEST_OPTIONS: u8 = 60;
const MAX_EXTENSION_HEADERS: usize = 8;

struct NetworkLayer {
    source: IpAddr,
    destination: IpAddr,
    next_header: u8,
}

/// Transport-layer label for an IP protocol number, if it is one.
pub fn transport_label(protocol: u8) -> Option<&'static str> {
    match protocol {
        6 => Some("TCP"),
        17 => Some("UDP"),
        33 => Some("DCCP"),
        132 => Some("SCTP"),
        _ => None,
    }
}

/// Pulls the per-packet fields out of a decoded packet.
///
/// Returns `None` for anything without an IP header or without a
/// recognised transport layer.
pub fn extract(packet: &DecodedPacket) -> Option<PacketRecord> {
    let network = match packet.link_type {
        LinkType::Ethernet => parse_ethernet(&packet.data)?,
        LinkType::LinuxSll => {
            let sll = SLLPacket::new(&packet.data)?;
            parse_ethertype(sll.get_protocol(), sll.payload())?
        }
        LinkType::RawIp => parse_ip(&packet.data)?,
        // 4 byte address family header, family byte order depends on the capturing host
        LinkType::Loopback => parse_ip(packet.data.get(4..)?)?,
        LinkType::Other(_) => return None,
    };

    let protocol = transport_label(network.next_header)?;

    Some(PacketRecord::new(
        packet.timestamp,
        Some(network.source.to_string()),
        Some(network.destination.to_string()),
        protocol,
        packet.wire_len as u64,
    ))
}

/// Lazily maps reader output to records, dropping packets that yield none.
pub fn extract_records<I>(packets: I) -> impl Iterator<Item = Result<PacketRecord, CaptureError>>
where
    I: IntoIterator<Item = Result<DecodedPacket, CaptureError>>,
{
    packets.into_iter().filter_map(|item| match item {
        Ok(packet) => extract(&packet).map(Ok),
        Err(e) => Some(Err(e)),
    })
}

fn parse_ethernet(data: &[u8]) -> Option<NetworkLayer> {
    let ethernet = EthernetPacket::new(data)?;
    match ethernet.get_ethertype() {
        EtherTypes::Vlan => {
            let vlan = VlanPacket::new(ethernet.payload())?;
            parse_ethertype(vlan.get_ethertype(), vlan.payload())
        }
        ethertype => parse_ethertype(ethertype, ethernet.payload()),
    }
}

fn parse_ethertype(ethertype: EtherType, payload: &[u8]) -> Option<NetworkLayer> {
    match ethertype {
        EtherTypes::Ipv4 => parse_ipv4(payload),
        EtherTypes::Ipv6 => parse_ipv6(payload),
        _ => None,
    }
}

fn parse_ip(data: &[u8]) -> Option<NetworkLayer> {
    match data.first()? >> 4 {
        4 => parse_ipv4(data),
        6 => parse_ipv6(data),
        _ => None,
    }
}

fn parse_ipv4(data: &[u8]) -> Option<NetworkLayer> {
    let ipv4 = Ipv4Packet::new(data)?;
    let header_len = ipv4.get_header_length() as usize * 4;
    if ipv4.get_version() != 4 || header_len < 20 || header_len > data.len() {
        return None;
    }

    Some(NetworkLayer {
        source: IpAddr::V4(ipv4.get_source()),
        destination: IpAddr::V4(ipv4.get_destination()),
        next_header: ipv4.get_next_level_protocol().0,
    })
}

fn parse_ipv6(data: &[u8]) -> Option<NetworkLayer> {
    let ipv6 = Ipv6Packet::new(data)?;
    if ipv6.get_version() != 6 {
        return None;
    }

    Some(NetworkLayer {
        source: IpAddr::V6(ipv6.get_source()),
        destination: IpAddr::V6(ipv6.get_destination()),
        next_header: skip_extension_headers(ipv6.get_next_header().0, ipv6.payload())?,
    })
}

fn skip_extension_headers(mut next_header: u8, mut payload: &[u8]) -> Option<u8> {
    for _ in 0..MAX_EXTENSION_HEADERS {
        let header_len = match next_header {
            IPV6_HOP_BY_HOP | IPV6_ROUTING | IPV6_DEST_OPTIONS => (*payload.get(1)? as usize + 1) * 8,
            IPV6_FRAGMENT => 8,
            _ => return Some(next_header),
        };
        next_header = *payload.first()?;
        payload = payload.get(header_len..)?;
    }
    None
}
