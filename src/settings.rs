use std::path::{Path, PathBuf};

const OUTPUT_DIR_ENV: &str = "PCAP_PLOT_DIR";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlotSettings {
    pub output_dir: PathBuf,
    pub capture_extensions: Vec<&'static str>,
    pub width: u32,
    pub height: u32,
    /// Width of one file's bar within a flag group, in group units.
    pub bar_width: f64,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("plots"),
            capture_extensions: vec!["pcap", "pcapng"],
            width: 1000,
            height: 500,
            bar_width: 0.2,
        }
    }
}

impl PlotSettings {
    /// Defaults, with the output folder taken from `PCAP_PLOT_DIR` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(OUTPUT_DIR_ENV).filter(|d| !d.is_empty()) {
            Some(dir) => Self::default().with_output_dir(dir),
            None => Self::default(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn is_capture_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| {
                self.capture_extensions
                    .iter()
                    .any(|ext| name.ends_with(&format!(".{ext}")))
            })
            .unwrap_or(false)
    }
}
