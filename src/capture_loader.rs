use crate::{
    error::CaptureError,
    packet_processor::{PacketProcessor, PacketRecord},
    settings::PlotSettings,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use pcap::Capture;
use std::path::Path;

/// Turns a capture file into its ordered packet records.
pub(crate) trait CaptureReader {
    fn read_packets(&self, path: &Path) -> Result<Vec<PacketRecord>, CaptureError>;
}

/// Reads `.pcap`/`.pcapng` savefiles through libpcap.
pub(crate) struct PcapFileReader;

impl CaptureReader for PcapFileReader {
    fn read_packets(&self, path: &Path) -> Result<Vec<PacketRecord>, CaptureError> {
        let mut capture = Capture::from_file(path).map_err(CaptureError::Open)?;
        let processor = PacketProcessor::new(capture.get_datalink().0);
        let mut packets = Vec::new();
        loop {
            match capture.next() {
                Ok(packet) => packets.push(processor.process(&packet)),
                Err(pcap::Error::NoMorePackets) => break,
                Err(source) if packets.is_empty() => {
                    return Err(CaptureError::Read { index: 0, source })
                }
                Err(source) => {
                    // keep what was read before the damaged record
                    warn!(
                        "Error reading {} after {} packets, keeping them: {}",
                        path.display(),
                        packets.len(),
                        source
                    );
                    break;
                }
            }
        }
        Ok(packets)
    }
}

/// A successfully loaded, non-empty capture file.
#[derive(Debug, Clone)]
pub(crate) struct CaptureFile {
    pub name: String,
    pub packets: Vec<PacketRecord>,
}

impl CaptureFile {
    /// Capture time of the first packet; all relative times are measured from here.
    pub fn origin(&self) -> Option<DateTime<Utc>> {
        self.packets.first().map(|p| p.timestamp)
    }
}

/// Loads every capture file in `dir`. Files that are not captures, fail to
/// parse, or hold no packets are reported and skipped.
pub(crate) fn load_captures(
    dir: &Path,
    settings: &PlotSettings,
    reader: &dyn CaptureReader,
) -> Vec<CaptureFile> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Error listing {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Error listing {}: {}", dir.display(), e);
                None
            }
        })
        .collect();
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !settings.is_capture_file(&path) {
            info!("Skipping non-PCAP file: {}", name);
            continue;
        }

        let packets = match reader.read_packets(&path) {
            Ok(packets) => packets,
            Err(e) => {
                warn!("Error reading {}: {}", name, e);
                continue;
            }
        };

        if packets.is_empty() {
            warn!("Warning: {} contains no packets and will be skipped.", name);
            continue;
        }

        info!("Loaded {} packets from {}", packets.len(), name);
        files.push(CaptureFile { name, packets });
    }
    files
}
