//! Therapy session reports filed against students.

pub mod handlers;
pub mod repository;
