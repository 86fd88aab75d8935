use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An alternate external identifier for a book, e.g. ("ISBN-10", "0158757819").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub scheme: String,
    pub value: String,
}

/// A book record as parsed from a source XML element, before identifier
/// resolution. The raw id is untrusted and may be missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub raw_id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub aliases: Vec<AliasEntry>,
}

/// Result of persisting a single book record.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub identifier: String,
    pub book_created: bool,
    pub aliases_created: usize,
}

/// Totals for a whole-document import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub books_created: usize,
    pub books_updated: usize,
    pub aliases_created: usize,
    /// Raw ids of records that declared a non-initial version but could not
    /// be matched to any stored book.
    pub orphans: Vec<String>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("orphan update: record '{raw_id}' declares version {version} but no stored book matches its ISBN-10 alias")]
    OrphanUpdate { raw_id: String, version: String },
    #[error("database error: {0}")]
    Db(#[from] diesel::result::Error),
    #[error("connection pool: {0}")]
    Pool(String),
}
