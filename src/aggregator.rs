use crate::{capture_loader::CaptureFile, field::Field, packet_processor::PacketRecord};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Number(f64),
    Label(String),
}

/// Values for one field, gathered per capture file in load order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Aggregate {
    FlagCounts(Vec<FlagCounts>),
    Series(Vec<Series>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct FlagCounts {
    pub file: String,
    pub counts: HashMap<String, usize>,
}

impl FlagCounts {
    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Series {
    pub file: String,
    pub points: Vec<(f64, FieldValue)>,
}

impl Aggregate {
    pub fn collect(field: Field, files: &[CaptureFile]) -> Self {
        match field {
            Field::TcpFlags => Aggregate::FlagCounts(files.iter().map(count_flags).collect()),
            _ => Aggregate::Series(files.iter().map(|f| collect_series(field, f)).collect()),
        }
    }
}

/// Sorted union of every flag label seen in any file.
pub(crate) fn flag_labels(tables: &[FlagCounts]) -> Vec<String> {
    tables
        .iter()
        .flat_map(|t| t.counts.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn count_flags(file: &CaptureFile) -> FlagCounts {
    let mut counts = HashMap::new();
    for value in file.packets.iter().filter_map(|p| extract(Field::TcpFlags, p)) {
        if let FieldValue::Label(label) = value {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    FlagCounts {
        file: file.name.clone(),
        counts,
    }
}

fn collect_series(field: Field, file: &CaptureFile) -> Series {
    let points = match file.origin() {
        Some(origin) => file
            .packets
            .iter()
            .filter_map(|p| extract(field, p).map(|v| (p.seconds_since(origin), v)))
            .collect(),
        None => Vec::new(),
    };
    Series {
        file: file.name.clone(),
        points,
    }
}

/// The selected field's value for one packet, or `None` when its layer is absent.
fn extract(field: Field, packet: &PacketRecord) -> Option<FieldValue> {
    use FieldValue::*;
    match field {
        Field::PacketSize => Some(Number(packet.size as f64)),
        Field::TcpWindowSize => packet.tcp.as_ref().map(|t| Number(t.window.into())),
        Field::TcpFlags => packet.tcp.as_ref().map(|t| Label(t.flags.clone())),
        Field::TlsVersion => packet.tls.map(|t| Label(t.version_label())),
        Field::TlsLength => packet.tls.map(|t| Number(t.length.into())),
        Field::IpLength => packet.ip.map(|ip| Number(ip.length.into())),
        Field::IpTtl => packet.ip.map(|ip| Number(ip.ttl.into())),
    }
}
