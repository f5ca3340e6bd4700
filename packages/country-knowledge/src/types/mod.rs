//! Domain types for documents and knowledge records.

pub mod document;
pub mod record;
