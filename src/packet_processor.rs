use chrono::{DateTime, TimeZone, Utc};
use pnet::packet::{
    ethernet::{EtherType, EtherTypes, EthernetPacket},
    ip::IpNextHeaderProtocols,
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    Packet,
};

const TLS_PORT: u16 = 443;
const TLS_RECORD_HEADER_LEN: usize = 5;

/// Link-layer header types (tcpdump.org `LINKTYPE_*`) we know how to unwrap.
mod linktype {
    pub const NULL: i32 = 0;
    pub const ETHERNET: i32 = 1;
    pub const RAW_BSD: i32 = 12;
    pub const RAW_OPENBSD: i32 = 14;
    pub const RAW: i32 = 101;
    pub const LOOP: i32 = 108;
    pub const LINUX_SLL: i32 = 113;
    pub const IPV4: i32 = 228;
    pub const IPV6: i32 = 229;
}

/// Flag letters in bit order, lowest bit first.
const TCP_FLAG_LETTERS: [(u16, char); 9] = [
    (0x001, 'F'),
    (0x002, 'S'),
    (0x004, 'R'),
    (0x008, 'P'),
    (0x010, 'A'),
    (0x020, 'U'),
    (0x040, 'E'),
    (0x080, 'C'),
    (0x100, 'N'),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TcpFacet {
    pub flags: String,
    pub window: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TlsFacet {
    pub version: u16,
    pub length: u16,
}

impl TlsFacet {
    pub fn version_label(&self) -> String {
        format!("0x{:04X}", self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IpFacet {
    pub length: u16,
    pub ttl: u8,
}

/// One captured frame with whichever protocol layers could be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PacketRecord {
    pub timestamp: DateTime<Utc>,
    pub size: usize,
    pub tcp: Option<TcpFacet>,
    pub tls: Option<TlsFacet>,
    pub ip: Option<IpFacet>,
}

impl PacketRecord {
    pub fn new(timestamp: DateTime<Utc>, size: usize) -> Self {
        Self {
            timestamp,
            size,
            tcp: None,
            tls: None,
            ip: None,
        }
    }

    /// Seconds elapsed since `origin`, with microsecond resolution.
    pub fn seconds_since(&self, origin: DateTime<Utc>) -> f64 {
        let delta = self.timestamp - origin;
        match delta.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => delta.num_milliseconds() as f64 / 1_000.0,
        }
    }
}

/// Decodes captured frames of a single link type into [`PacketRecord`]s.
pub(crate) struct PacketProcessor {
    linktype: i32,
}

impl PacketProcessor {
    pub(crate) fn new(linktype: i32) -> Self {
        Self { linktype }
    }

    pub(crate) fn process(&self, packet: &pcap::Packet) -> PacketRecord {
        let timestamp = get_timestamp(packet.header.ts.tv_sec as i64, packet.header.ts.tv_usec as i64);
        self.decode(timestamp, packet.data)
    }

    pub(crate) fn decode(&self, timestamp: DateTime<Utc>, data: &[u8]) -> PacketRecord {
        let mut record = PacketRecord::new(timestamp, data.len());
        match self.linktype {
            linktype::ETHERNET => {
                if let Some(ethernet) = EthernetPacket::new(data) {
                    add_network_layer(&mut record, ethernet.get_ethertype(), ethernet.payload());
                }
            }
            linktype::LINUX_SLL => {
                // 16 byte cooked header, protocol in the last two bytes
                if data.len() >= 16 {
                    let ethertype = EtherType(u16::from_be_bytes([data[14], data[15]]));
                    add_network_layer(&mut record, ethertype, &data[16..]);
                }
            }
            linktype::NULL | linktype::LOOP => {
                // 4 byte address family, byte order depends on the capturing host
                if data.len() >= 4 {
                    add_ip_by_version(&mut record, &data[4..]);
                }
            }
            linktype::RAW | linktype::RAW_BSD | linktype::RAW_OPENBSD => {
                add_ip_by_version(&mut record, data);
            }
            linktype::IPV4 => add_network_layer(&mut record, EtherTypes::Ipv4, data),
            linktype::IPV6 => add_network_layer(&mut record, EtherTypes::Ipv6, data),
            _ => {}
        }
        record
    }
}

fn add_ip_by_version(record: &mut PacketRecord, data: &[u8]) {
    match data.first().map(|b| b >> 4) {
        Some(4) => add_network_layer(record, EtherTypes::Ipv4, data),
        Some(6) => add_network_layer(record, EtherTypes::Ipv6, data),
        _ => {}
    }
}

fn add_network_layer(record: &mut PacketRecord, ethertype: EtherType, data: &[u8]) {
    match ethertype {
        EtherTypes::Ipv4 => {
            if let Some(ipv4) = Ipv4Packet::new(data) {
                record.ip = Some(IpFacet {
                    length: ipv4.get_total_length(),
                    ttl: ipv4.get_ttl(),
                });
                if ipv4.get_next_level_protocol() == IpNextHeaderProtocols::Tcp {
                    add_transport_layer(record, ipv4.payload());
                }
            }
        }
        EtherTypes::Ipv6 => {
            if let Some(ipv6) = Ipv6Packet::new(data) {
                if ipv6.get_next_header() == IpNextHeaderProtocols::Tcp {
                    add_transport_layer(record, ipv6.payload());
                }
            }
        }
        _ => {}
    }
}

fn add_transport_layer(record: &mut PacketRecord, data: &[u8]) {
    let Some(tcp) = TcpPacket::new(data) else {
        return;
    };
    record.tcp = Some(TcpFacet {
        flags: flag_label(tcp.get_flags() as u16),
        window: tcp.get_window(),
    });
    if tcp.get_source() == TLS_PORT || tcp.get_destination() == TLS_PORT {
        record.tls = parse_tls_record_header(tcp.payload());
    }
}

/// Renders set TCP control bits as letters, e.g. SYN+ACK becomes `SA`.
pub(crate) fn flag_label(flags: u16) -> String {
    TCP_FLAG_LETTERS
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, letter)| *letter)
        .collect()
}

/// Reads the first TLS record header: type (1) + version (2) + length (2).
fn parse_tls_record_header(payload: &[u8]) -> Option<TlsFacet> {
    if payload.len() < TLS_RECORD_HEADER_LEN {
        return None;
    }
    let content_type = payload[0];
    if !(20..=24).contains(&content_type) || payload[1] != 3 {
        return None;
    }
    Some(TlsFacet {
        version: u16::from_be_bytes([payload[1], payload[2]]),
        length: u16::from_be_bytes([payload[3], payload[4]]),
    })
}

fn get_timestamp(tv_sec: i64, tv_usec: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(tv_sec, (tv_usec * 1000) as u32)
        .single()
        .unwrap_or_default()
}
