use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::book_identity::{detect_book_id, detect_book_version};
use crate::db::books::{get_or_create_alias, get_or_create_book, save_book, BooksDbHandle};
use crate::logger::{debug, info, warn};
use crate::types::{AliasEntry, BookRecord, ImportStats, IngestError, IngestOutcome};

fn attr_value(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

fn book_record_from_attrs(e: &BytesStart) -> Result<BookRecord> {
    // The id attribute is raw and untrusted; a missing one is resolved later
    // like any other non-canonical id.
    let raw_id = attr_value(e, b"id")?.unwrap_or_default();
    Ok(BookRecord {
        raw_id,
        ..BookRecord::default()
    })
}

fn alias_from_attrs(e: &BytesStart) -> Result<AliasEntry> {
    Ok(AliasEntry {
        scheme: attr_value(e, b"scheme")?.unwrap_or_default(),
        value: attr_value(e, b"value")?.unwrap_or_default(),
    })
}

/// Parse every `<book>` element in an XML document into records.
///
/// A wrapper element around the books is tolerated and ignored. Absent
/// children parse as their defaults: a missing title is an empty string,
/// never an error.
pub fn parse_book_elements(xml: &str) -> Result<Vec<BookRecord>> {
    let mut reader = Reader::from_str(xml);

    let mut records: Vec<BookRecord> = Vec::new();
    let mut current: Option<BookRecord> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match local.as_str() {
                    "book" => {
                        current = Some(book_record_from_attrs(e)?);
                        current_tag.clear();
                    }
                    "alias" => {
                        if let Some(rec) = current.as_mut() {
                            rec.aliases.push(alias_from_attrs(e)?);
                        }
                        current_tag.clear();
                    }
                    _ => current_tag = local,
                }
            }
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                // A self-closed <book/> has no children, but still counts as
                // a record.
                b"book" => records.push(book_record_from_attrs(e)?),
                b"alias" => {
                    if let Some(rec) = current.as_mut() {
                        rec.aliases.push(alias_from_attrs(e)?);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if let Some(rec) = current.as_mut() {
                    let text = e.unescape()?.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match current_tag.as_str() {
                        "title" => rec.title = text,
                        "description" => rec.description = Some(text),
                        "version" => rec.version = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"book" {
                    if let Some(rec) = current.take() {
                        records.push(rec);
                    }
                } else {
                    current_tag.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
    }

    Ok(records)
}

/// Parse a single `<book>` element.
pub fn parse_book_element(xml: &str) -> Result<BookRecord> {
    parse_book_elements(xml)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No <book> element found"))
}

/// Persist one parsed book record.
///
/// The whole upsert runs under the handle's write lock inside one immediate
/// transaction, so each ingestion is processed end-to-end before the next
/// begins: resolve the version, resolve the canonical identifier, assign
/// title/description/version, then create each (scheme, value) alias pair
/// under the book. Existing pairs are skipped, as are unique-violation races;
/// all other database errors propagate and roll the record back.
pub fn process_book_element(
    dbh: &BooksDbHandle,
    record: &BookRecord,
) -> Result<IngestOutcome, IngestError> {
    let _lock = dbh.write_lock.lock();
    let mut db_conn = dbh
        .get_conn()
        .map_err(|e| IngestError::Pool(e.to_string()))?;

    db_conn.immediate_transaction(|db_conn| {
        let book_version = detect_book_version(record);
        let book_identifier = detect_book_id(db_conn, record, &book_version)?;

        let (mut book, book_created) = get_or_create_book(db_conn, &book_identifier)?;
        book.title = record.title.clone();
        book.description = record.description.clone();
        book.version = book_version;

        let mut aliases_created = 0;
        for alias in &record.aliases {
            match get_or_create_alias(db_conn, &book, &alias.scheme, &alias.value) {
                Ok((_, true)) => aliases_created += 1,
                Ok((_, false)) => {}
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {}
                Err(e) => return Err(IngestError::Db(e)),
            }
        }

        save_book(db_conn, &mut book)?;

        debug(&format!(
            "Persisted '{}' as {} ({} new alias(es))",
            record.raw_id, book_identifier, aliases_created
        ));

        Ok(IngestOutcome {
            identifier: book_identifier,
            book_created,
            aliases_created,
        })
    })
}

/// Parse an XML document and persist every book record in it.
///
/// Orphan updates are reported in the stats instead of aborting the batch;
/// database errors abort.
pub fn import_xml_to_db(dbh: &BooksDbHandle, xml: &str) -> Result<ImportStats> {
    let records = parse_book_elements(xml)?;
    info(&format!("Importing {} book record(s)", records.len()));

    let mut stats = ImportStats::default();

    for record in &records {
        match process_book_element(dbh, record) {
            Ok(outcome) => {
                if outcome.book_created {
                    stats.books_created += 1;
                } else {
                    stats.books_updated += 1;
                }
                stats.aliases_created += outcome.aliases_created;
            }
            Err(IngestError::OrphanUpdate { .. }) => {
                warn(&format!(
                    "Skipping orphan update record '{}': no stored book matches its ISBN-10 alias",
                    record.raw_id
                ));
                stats.orphans.push(record.raw_id.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }

    info(&format!(
        "Import finished: {}",
        serde_json::to_string(&stats).unwrap_or_default()
    ));

    Ok(stats)
}

/// Import an XML file into the database.
pub fn import_xml_file_to_db(dbh: &BooksDbHandle, xml_path: &Path) -> Result<ImportStats> {
    info(&format!("Importing books from {:?}", xml_path));
    let xml = fs::read_to_string(xml_path)
        .with_context(|| format!("Failed to read {:?}", xml_path))?;
    import_xml_to_db(dbh, &xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_book_element() {
        let xml = r#"
        <book id="12345">
            <title>A title</title>
            <aliases>
                <alias scheme="ISBN-10" value="0158757819"/>
                <alias scheme="ISBN-13" value="0000000000123"/>
            </aliases>
        </book>
        "#;

        let record = parse_book_element(xml).unwrap();
        assert_eq!(record.raw_id, "12345");
        assert_eq!(record.title, "A title");
        assert_eq!(record.description, None);
        assert_eq!(record.version, None);
        assert_eq!(record.aliases.len(), 2);
        assert_eq!(record.aliases[0].scheme, "ISBN-10");
        assert_eq!(record.aliases[0].value, "0158757819");
        assert_eq!(record.aliases[1].scheme, "ISBN-13");
        assert_eq!(record.aliases[1].value, "0000000000123");
    }

    #[test]
    fn test_parse_description_and_version() {
        let xml = r#"
        <book id="book-7">
            <title>A title</title>
            <description>Some description</description>
            <version>2.0</version>
        </book>
        "#;

        let record = parse_book_element(xml).unwrap();
        assert_eq!(record.raw_id, "book-7");
        assert_eq!(record.description.as_deref(), Some("Some description"));
        assert_eq!(record.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_parse_missing_title_is_empty() {
        let xml = r#"<book id="x"><aliases/></book>"#;
        let record = parse_book_element(xml).unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.aliases.len(), 0);
    }

    #[test]
    fn test_parse_alias_start_end_form() {
        let xml = r#"
        <book id="x">
            <title>A title</title>
            <aliases>
                <alias scheme="ISBN-10" value="0158757819"></alias>
            </aliases>
        </book>
        "#;

        let record = parse_book_element(xml).unwrap();
        assert_eq!(record.aliases.len(), 1);
        assert_eq!(record.aliases[0].scheme, "ISBN-10");
    }

    #[test]
    fn test_parse_multiple_books_with_wrapper() {
        let xml = r#"
        <catalog>
            <book id="1"><title>First</title></book>
            <book id="2"><title>Second</title></book>
        </catalog>
        "#;

        let records = parse_book_elements(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "First");
        assert_eq!(records[1].title, "Second");
    }

    #[test]
    fn test_parse_self_closed_book() {
        // <book id="x"/> and <book id="x"></book> are equivalent
        // serializations; both must yield a record.
        let xml = r#"
        <catalog>
            <book id="12345"/>
            <book id="67890">
                <title>Another title</title>
            </book>
        </catalog>
        "#;

        let records = parse_book_elements(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw_id, "12345");
        assert_eq!(records[0].title, "");
        assert_eq!(records[1].raw_id, "67890");
        assert_eq!(records[1].title, "Another title");
    }

    #[test]
    fn test_parse_no_book_element() {
        assert!(parse_book_element("<catalog></catalog>").is_err());
    }

    #[test]
    fn test_parse_escaped_text() {
        let xml = r#"<book id="x"><title>Tom &amp; Jerry</title></book>"#;
        let record = parse_book_element(xml).unwrap();
        assert_eq!(record.title, "Tom & Jerry");
    }
}
