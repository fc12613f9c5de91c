//! Mapping resources
//!
//! The descriptor's `[mappings] resources` are SQL DDL files describing the
//! entity tables. They are applied once per database, with checksums so a
//! silently edited mapping is detected.

mod checksums;
mod runner;

pub use checksums::compute_checksum;
pub use runner::{apply_mappings, MappingResource};
