use crate::common::config::PageId;
use thiserror::Error;

/// Failures surfaced by the disk layer. Everything above the disk manager speaks in booleans and
/// options; an error here is fatal to the operation that triggered it.
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("i/o failure on page {page_id}: {source}")]
    PageIo {
        page_id: PageId,
        #[source]
        source: std::io::Error,
    },
    #[error("log i/o failure: {0}")]
    LogIo(#[from] std::io::Error),
    #[error("failed to open database file {file_name}: {source}")]
    Open {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}
