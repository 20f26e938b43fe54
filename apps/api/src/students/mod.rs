//! Student records: profile CRUD, case records, photos and PDF documents.

pub mod documents;
pub mod handlers;
pub mod repository;
