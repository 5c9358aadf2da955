//! # Research Resolve
//!
//! Query arXiv, bioRxiv/medRxiv, OpenAlex and Semantic Scholar through one
//! interface, normalize their answers into a single [`Paper`] record, and
//! resolve a reference to a paper by DOI or by fuzzy title match.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures ([`Paper`], [`Reference`], lookup queries)
//! - [`sources`]: One adapter per provider behind the [`Source`] trait
//! - [`resolver`]: The [`Resolver`] that walks sources in priority order
//! - [`utils`]: Title matching, retry policies, rate limiting, HTTP and caching
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use research_resolve::config::load_config;
//! use research_resolve::{Reference, Resolver};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let resolver = Resolver::from_config(&config)?;
//!
//! let reference = Reference::title("Attention Is All You Need");
//! if let Some(paper) = resolver.resolve(&reference).await {
//!     println!("{} ({:?})", paper.title(), paper.pdf_url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod resolver;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{Paper, Reference};
pub use resolver::Resolver;
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
