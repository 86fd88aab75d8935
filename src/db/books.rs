use chrono::Utc;
use diesel::prelude::*;
use diesel::result::Error as DieselError;

use crate::db::books_models::*;
use crate::db::books_schema::{book_aliases, books};
use crate::db::DatabaseHandle;
use crate::logger::error;

pub type BooksDbHandle = DatabaseHandle;

/// Fetch the book row for a canonical identifier, creating an empty row when
/// none exists yet. Returns the row and whether it was created.
pub fn get_or_create_book(
    db_conn: &mut SqliteConnection,
    book_identifier: &str,
) -> Result<(Book, bool), DieselError> {
    let existing = books::table
        .filter(books::identifier.eq(book_identifier))
        .select(Book::as_select())
        .first(db_conn)
        .optional()?;

    if let Some(book) = existing {
        return Ok((book, false));
    }

    let new_book = NewBook {
        identifier: book_identifier,
        title: "",
        description: None,
        version: "1.0",
    };

    let book = diesel::insert_into(books::table)
        .values(&new_book)
        .returning(Book::as_returning())
        .get_result(db_conn)?;

    Ok((book, true))
}

/// Fetch or create a (scheme, value) alias under a book. An existing pair is
/// returned with `was_created == false` rather than raising a constraint
/// violation, so callers can tell an idempotent skip apart from a genuine
/// persistence error.
pub fn get_or_create_alias(
    db_conn: &mut SqliteConnection,
    book: &Book,
    alias_scheme: &str,
    alias_value: &str,
) -> Result<(BookAlias, bool), DieselError> {
    let existing = book_aliases::table
        .filter(book_aliases::book_id.eq(book.id))
        .filter(book_aliases::scheme.eq(alias_scheme))
        .filter(book_aliases::value.eq(alias_value))
        .select(BookAlias::as_select())
        .first(db_conn)
        .optional()?;

    if let Some(alias) = existing {
        return Ok((alias, false));
    }

    let new_alias = NewBookAlias {
        book_id: book.id,
        scheme: alias_scheme,
        value: alias_value,
    };

    let alias = diesel::insert_into(book_aliases::table)
        .values(&new_alias)
        .returning(BookAlias::as_returning())
        .get_result(db_conn)?;

    Ok((alias, true))
}

pub fn count_books(db_conn: &mut SqliteConnection) -> Result<i64, DieselError> {
    books::table.count().get_result(db_conn)
}

/// Scan all stored aliases for a (scheme, value) pair and return the owning
/// book's identifier. The scan runs in book id order and the last match wins
/// when the same pair exists under more than one book, matching the original
/// full-scan behavior. Whether duplicate ISBN-10 values across distinct books
/// are a real scenario is an open question; do not change the ordering
/// without confirming intent.
pub fn find_book_by_alias(
    db_conn: &mut SqliteConnection,
    alias_scheme: &str,
    alias_value: &str,
) -> Result<Option<String>, DieselError> {
    let mut matches: Vec<String> = book_aliases::table
        .inner_join(books::table)
        .filter(book_aliases::scheme.eq(alias_scheme))
        .filter(book_aliases::value.eq(alias_value))
        .order(books::id.asc())
        .select(books::identifier)
        .load(db_conn)?;

    Ok(matches.pop())
}

/// Write a book row's current field values back to the database, stamping
/// updated_at.
pub fn save_book(db_conn: &mut SqliteConnection, book: &mut Book) -> Result<usize, DieselError> {
    book.updated_at = Some(Utc::now().naive_utc());
    diesel::update(books::table.find(book.id))
        .set(&*book)
        .execute(db_conn)
}

impl BooksDbHandle {
    pub fn get_book(&self, book_identifier: &str) -> Option<Book> {
        let book = self.do_read(|db_conn| {
            books::table
                .filter(books::identifier.eq(book_identifier))
                .select(Book::as_select())
                .first(db_conn)
                .optional()
        });

        match book {
            Ok(x) => x,
            Err(e) => {
                error(&format!("get_book(): {}", e));
                None
            }
        }
    }

    pub fn get_book_aliases(&self, book: &Book) -> Vec<BookAlias> {
        let result = self.do_read(|db_conn| {
            book_aliases::table
                .filter(book_aliases::book_id.eq(book.id))
                .order(book_aliases::id.asc())
                .select(BookAlias::as_select())
                .load(db_conn)
        });

        match result {
            Ok(aliases) => aliases,
            Err(e) => {
                error(&format!("get_book_aliases(): {}", e));
                Vec::new()
            }
        }
    }

    pub fn count_books(&self) -> i64 {
        match self.do_read(|db_conn| count_books(db_conn)) {
            Ok(n) => n,
            Err(e) => {
                error(&format!("count_books(): {}", e));
                0
            }
        }
    }
}
