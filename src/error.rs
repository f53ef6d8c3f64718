use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum CaptureError {
    #[error("could not open capture: {0}")]
    Open(#[source] pcap::Error),
    #[error("could not read packet {index}: {source}")]
    Read {
        index: usize,
        #[source]
        source: pcap::Error,
    },
}

#[derive(Debug, Error)]
pub(crate) enum RenderError {
    #[error("drawing failed: {0}")]
    Drawing(String),
}

impl RenderError {
    pub fn drawing(err: impl std::fmt::Display) -> Self {
        RenderError::Drawing(err.to_string())
    }
}

#[derive(Debug, Error)]
pub(crate) enum InputError {
    #[error("Error: Folder '{0}' does not exist.")]
    MissingFolder(String),
    #[error("Error: could not create output folder '{}': {source}", path.display())]
    OutputFolder {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
