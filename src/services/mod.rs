pub mod excel;
pub mod import;
pub mod sqlite_store;
pub mod store;
