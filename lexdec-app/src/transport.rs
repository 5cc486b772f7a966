use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lexdec_experiment::{ResultTransport, SessionExport, TransportError};
use tracing::info;

/// Writes the session export as pretty-printed JSON, replacing the file on
/// every send.
pub struct JsonFileTransport {
    path: PathBuf,
    sends: usize,
}

impl JsonFileTransport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
            sends: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of successful sends so far.
    pub fn sends(&self) -> usize {
        self.sends
    }
}

impl ResultTransport for JsonFileTransport {
    fn send(&mut self, export: &SessionExport) -> Result<(), TransportError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, export)?;
        writer.flush()?;
        self.sends += 1;
        info!(path = %self.path.display(), records = export.records.len(), "results written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut transport = JsonFileTransport::new(&path);
        let export = SessionExport {
            participant_id: "q1w2e3".into(),
            records: Vec::new(),
        };

        transport.send(&export).unwrap();
        transport.send(&export).unwrap();

        let back: SessionExport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, export);
        assert_eq!(transport.sends(), 2);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = JsonFileTransport::new(&dir.path().join("nope/results.json"));
        let export = SessionExport {
            participant_id: "q1w2e3".into(),
            records: Vec::new(),
        };
        assert!(matches!(
            transport.send(&export),
            Err(TransportError::Io(_))
        ));
        assert_eq!(transport.sends(), 0);
    }
}
