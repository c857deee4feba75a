pub mod catalog;
pub mod db;

pub use catalog::JsonCatalog;
pub use db::PgDocumentStore;
