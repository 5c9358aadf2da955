//! Core data models for research papers and lookups.

mod lookup;
mod paper;

pub use lookup::{LookupQuery, Match, Reference};
pub use paper::{Paper, PaperBuilder, SourceType};
