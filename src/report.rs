//! Append-only export of test run summaries
//!
//! One row per full sequence. The file gains its header when it is
//! created and is only ever appended to afterwards, so an operator can
//! leave the same summary log accumulating across bench sessions.

use std::{ error::Error, fmt, fs::OpenOptions, io, path::Path };
use crate::sequence::TestRunSummary;

/// Appends one summary row to the log at `path`
///
/// Creates the file with a header row on first write.
pub fn append_summary(path: &Path, summary: &TestRunSummary) -> Result<(), ReportError>
{
    let write_header = !path.exists();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}

/// An error while writing the summary log
#[derive(Debug)]
pub enum ReportError
{
    Io(io::Error),
    Csv(csv::Error),
}

impl fmt::Display for ReportError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            ReportError::Io(io_err) => write!(f, "unable to write summary log. Caused by: {}", io_err),
            ReportError::Csv(csv_err) => write!(f, "unable to serialize summary row. Caused by: {}", csv_err),
        }
    }
}

impl Error for ReportError {}

impl From<io::Error> for ReportError
{
    fn from(this: io::Error) -> Self
    {
        ReportError::Io(this)
    }
}

impl From<csv::Error> for ReportError
{
    fn from(this: csv::Error) -> Self
    {
        ReportError::Csv(this)
    }
}
