pub mod books;
pub mod books_models;
pub mod books_schema;

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Error as AnyhowError, Result};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenvy::dotenv;
use parking_lot::Mutex;

use crate::db::books::BooksDbHandle;
use crate::get_create_bookshelf_app_root;
use crate::logger::info;
use crate::DB_FILE_NAME;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
pub struct DatabaseHandle {
    pool: SqlitePool,
    pub write_lock: Mutex<()>,
}

#[derive(Debug)]
pub struct DbManager {
    pub books: BooksDbHandle,
}

impl DatabaseHandle {
    pub fn new(database_url: &str) -> Result<Self> {
        let manager = ConnectionManager::new(database_url);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .with_context(|| format!("Failed to create pool for: {}", database_url))?;

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    /// An in-memory database with the schema applied. The pool holds a single
    /// connection, since each SQLite `:memory:` connection is its own db.
    pub fn new_in_memory() -> Result<Self> {
        let manager = ConnectionManager::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .context("Failed to create in-memory pool")?;

        let handle = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        handle.run_migrations()?;
        Ok(handle)
    }

    pub fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(AnyhowError::from)
    }

    pub fn run_migrations(&self) -> Result<()> {
        let mut db_conn = self.get_conn()?;
        db_conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;
        Ok(())
    }

    /// Performs a read operation on the database.
    pub fn do_read<F, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, diesel::result::Error>,
    {
        let mut db_conn = self.pool.get()
            .context("Failed to get connection from pool for read")?;
        operation(&mut db_conn).map_err(AnyhowError::from)
    }
}

impl DbManager {
    pub fn new() -> Result<Self> {
        dotenv().ok();

        let bookshelf_dir = match env::var("BOOKSHELF_DIR") {
            Ok(s) => PathBuf::from(s),
            Err(_) => {
                if let Ok(p) = get_create_bookshelf_app_root() {
                    p
                } else {
                    PathBuf::from(".")
                }
            }
        };

        if !bookshelf_dir.exists() {
            fs::create_dir_all(&bookshelf_dir)
                .with_context(|| format!("Failed to create data dir: {:?}", bookshelf_dir))?;
        }

        let db_path = bookshelf_dir.join(DB_FILE_NAME);
        // Canonicalize only resolves existing paths; on first run the db file
        // is created by the connection itself.
        let db_abs_path = fs::canonicalize(db_path.clone()).unwrap_or(db_path);
        let database_url = db_abs_path
            .to_str()
            .ok_or_else(|| anyhow!("Non-UTF8 database path: {:?}", db_abs_path))?
            .to_string();

        info(&format!("Opening books database at {}", database_url));

        let books = DatabaseHandle::new(&database_url)?;
        books.run_migrations()?;

        Ok(Self { books })
    }
}
