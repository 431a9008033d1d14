pub mod catalog;
pub mod config;
pub mod error;
pub mod legacy;
pub mod schema;
pub mod store;

pub use catalog::{Catalog, CatalogImport, CatalogItem, CatalogSet};
pub use config::{QuizConfig, default_base_dir, resolve_base_dir};
pub use error::{Result, StoreError};
pub use legacy::LegacyImportReport;
pub use store::{SetSummary, Store, StoreStats};
