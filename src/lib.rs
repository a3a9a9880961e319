//! Rule-based housekeeping for a Miniflux instance.
//!
//! Entries are fetched page by page, matched against an ordered list of
//! regex rules, and marked read or removed according to the first rule that
//! matches.
//!
//! # Architecture
//!
//! - [`config`] - rules file loading, validation, and API key lookup
//! - [`matcher`] - rule compilation and first-match-wins evaluation
//! - [`source`] - the remote entry source trait and its Miniflux adapter
//! - [`processor`] - the paginated fetch/match/update loop
//! - [`scheduler`] - single-run and fixed-interval execution
//!
//! # Example
//!
//! ```ignore
//! use miniflux_rules::{Config, Matcher, MinifluxClient, Processor};
//!
//! let config = Config::load(path)?;
//! let matcher = Arc::new(Matcher::new(&config.rules)?);
//! let client = MinifluxClient::new(&config.miniflux_url, api_key)?;
//! let stats = Processor::new(client, matcher, false).process().await?;
//! ```

pub mod config;
pub mod matcher;
pub mod processor;
pub mod scheduler;
pub mod source;

pub use config::{Config, ConfigError, Rule};
pub use matcher::{Matcher, RuleError, RuleField, RuleMatch};
pub use processor::{ProcessError, ProcessStats, Processor, PAGE_SIZE};
pub use source::{Entry, EntryPage, EntrySource, EntryStatus, Feed, MinifluxClient, SourceError};
