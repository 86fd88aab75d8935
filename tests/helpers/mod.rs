use bookshelf_backend::db::books::BooksDbHandle;
use bookshelf_backend::db::DatabaseHandle;
use bookshelf_backend::logger;
use bookshelf_backend::types::{AliasEntry, BookRecord};

pub fn test_db() -> BooksDbHandle {
    logger::init_logger();
    DatabaseHandle::new_in_memory().expect("Can't create in-memory database")
}

// The in-memory pool holds a single connection: drop any connection taken
// with get_conn() before calling process_book_element() on the same handle.
#[allow(dead_code)]
pub fn record(
    raw_id: &str,
    title: &str,
    version: Option<&str>,
    aliases: &[(&str, &str)],
) -> BookRecord {
    BookRecord {
        raw_id: raw_id.to_string(),
        title: title.to_string(),
        description: None,
        version: version.map(|v| v.to_string()),
        aliases: aliases
            .iter()
            .map(|(s, v)| AliasEntry {
                scheme: s.to_string(),
                value: v.to_string(),
            })
            .collect(),
    }
}
