//! Output destination selection for hlspoll

use clap::ValueEnum;
use hlspoll_engine::{FileSink, SegmentSink, StdoutSink};
use std::path::Path;
use tracing::info;

use crate::error::AppError;

/// Where downloaded segment bytes are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Append to a file
    #[default]
    File,
    /// Write to stdout
    Stdout,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::File => write!(f, "file"),
            OutputFormat::Stdout => write!(f, "stdout"),
        }
    }
}

/// Opens the sink for `format`. File output needs a path and is opened in
/// append mode, so an existing file keeps its contents.
pub fn create_sink(
    format: OutputFormat,
    path: Option<&Path>,
) -> Result<Box<dyn SegmentSink>, AppError> {
    match format {
        OutputFormat::File => {
            let path = path.ok_or_else(|| {
                AppError::InvalidInput("--output is required for file output".to_string())
            })?;
            let sink = FileSink::open(path)?;
            info!(path = %path.display(), "Writing stream to file");
            Ok(Box::new(sink))
        }
        OutputFormat::Stdout => Ok(Box::new(StdoutSink)),
    }
}
