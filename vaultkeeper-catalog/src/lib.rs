//! The Catalog Store: read, write, and diff a system's `gamelist.xml`.

pub mod diff;
pub mod error;
pub mod xml;

pub use diff::{diff_catalogs, CatalogDiff};
pub use error::CatalogError;
pub use xml::{copy_catalog_to_rom_tree, parse_catalog, parse_catalog_bytes, write_catalog};
