use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::db::books_schema::{book_aliases, books};

// Queryable struct for reading records
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, AsChangeset, PartialEq)]
#[diesel(table_name = books)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Book {
    pub id: i32,
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
    pub version: String,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

// Insertable struct for creating new records
#[derive(Insertable)]
#[diesel(table_name = books)]
pub struct NewBook<'a> {
    pub identifier: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub version: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(Book))]
#[diesel(table_name = book_aliases)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BookAlias {
    pub id: i32,
    pub book_id: i32,
    pub scheme: String,
    pub value: String,
}

#[derive(Insertable)]
#[diesel(table_name = book_aliases)]
pub struct NewBookAlias<'a> {
    pub book_id: i32,
    pub scheme: &'a str,
    pub value: &'a str,
}
