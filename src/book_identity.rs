use diesel::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;

use crate::db::books::{count_books, find_book_by_alias};
use crate::types::{BookRecord, IngestError};

/// The only alias scheme used for cross-version matching.
pub const ISBN10_SCHEME: &str = "ISBN-10";

lazy_static! {
    static ref RE_CANONICAL_BOOK_ID: Regex = Regex::new(r"^book-[1-9][0-9]*$").unwrap();
}

/// Whether an identifier is already in the canonical `book-<N>` form.
pub fn is_canonical_book_id(raw_id: &str) -> bool {
    RE_CANONICAL_BOOK_ID.is_match(raw_id)
}

/// Return the version of the record, defaulting to "1.0".
///
/// An explicit non-empty version is returned verbatim. Otherwise the version
/// is implied by the usage of "2nd edition" in the record's title.
pub fn detect_book_version(record: &BookRecord) -> String {
    if let Some(v) = &record.version {
        if !v.is_empty() {
            return v.clone();
        }
    }

    if record.title.to_lowercase().contains("2nd edition") {
        "2.0".to_string()
    } else {
        "1.0".to_string()
    }
}

/// Look up a stored book by an ISBN-10 alias value. Only the "ISBN-10"
/// scheme is supported; any other scheme yields None.
pub fn find_book_by_isbn(
    db_conn: &mut SqliteConnection,
    alias_scheme: &str,
    alias_value: &str,
) -> Result<Option<String>, diesel::result::Error> {
    if alias_scheme != ISBN10_SCHEME {
        return Ok(None);
    }
    find_book_by_alias(db_conn, alias_scheme, alias_value)
}

/// Resolve a record's raw identifier to the canonical `book-<N>` form.
///
/// - A raw id already in canonical form is returned unchanged.
/// - A version of "1.0" means a brand-new book: the next number in the
///   sequence is assigned from the stored book count. Callers serialize
///   ingestion (write lock + transaction), so count+1 cannot race within
///   the process; the UNIQUE constraint on books.identifier is the
///   cross-process backstop.
/// - Any other version is an update arriving with a corrupt id: the record's
///   ISBN-10 alias is matched against stored books to find the parent. No
///   ISBN-10 alias, or no stored match, is an orphan update and is an error
///   rather than an unusable identifier.
pub fn detect_book_id(
    db_conn: &mut SqliteConnection,
    record: &BookRecord,
    book_version: &str,
) -> Result<String, IngestError> {
    if is_canonical_book_id(&record.raw_id) {
        return Ok(record.raw_id.clone());
    }

    if book_version == "1.0" {
        let n = count_books(db_conn)? + 1;
        return Ok(format!("book-{}", n));
    }

    let isbn = record.aliases.iter().find(|a| a.scheme == ISBN10_SCHEME);

    let found = match isbn {
        Some(alias) => find_book_by_isbn(db_conn, &alias.scheme, &alias.value)?,
        None => None,
    };

    found.ok_or_else(|| IngestError::OrphanUpdate {
        raw_id: record.raw_id.clone(),
        version: book_version.to_string(),
    })
}
