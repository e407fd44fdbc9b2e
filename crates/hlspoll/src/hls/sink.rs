// Output sinks receiving decoded segment bytes.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only byte writer. Writes are synchronous and happen in segment order.
pub trait SegmentSink: Send {
    fn append(&mut self, data: &[u8]) -> io::Result<()>;

    /// Called once after every batch has been appended.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Appends to a file opened once (created if missing, never truncated).
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentSink for FileSink {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writes segment bytes to standard output, e.g. for piping into a player.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl SegmentSink for StdoutSink {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

impl SegmentSink for Vec<u8> {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}
