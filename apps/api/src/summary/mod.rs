//! Therapy progress analysis: statistics, prompt building, provider calls
//! and the template fallback.

pub mod analysis;
pub mod fallback;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
