pub mod types;
pub mod logger;
pub mod book_identity;
pub mod xml_import;

pub mod db;

use std::error::Error;
use std::fs::create_dir_all;
use std::path::PathBuf;

use app_dirs::{get_app_root, AppDataType, AppInfo};

pub const APP_INFO: AppInfo = AppInfo { name: "bookshelf", author: "bookshelf" };

pub const DB_FILE_NAME: &'static str = "books.sqlite3";

pub fn get_create_bookshelf_app_root() -> Result<PathBuf, Box<dyn Error>> {
    let p = get_app_root(AppDataType::UserData, &APP_INFO)?;
    if !p.exists() {
        create_dir_all(&p)?;
    }
    Ok(p)
}

