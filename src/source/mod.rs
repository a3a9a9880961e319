//! Remote entry source: the collaborator the processor pages through and
//! sends status updates to.
//!
//! - [`EntrySource`] - the capability the processor depends on
//! - [`MinifluxClient`] - production adapter over the Miniflux REST API
//!
//! Tests substitute an in-memory implementation of [`EntrySource`].

mod miniflux;
mod types;

pub use miniflux::MinifluxClient;
pub use types::{Category, Entry, EntryPage, EntryStatus, Feed, SourceError};

/// Fetch/update operations against a remote entry collection.
///
/// Implementations are driven sequentially: the processor never has more than
/// one call in flight.
#[allow(async_fn_in_trait)]
pub trait EntrySource {
    /// Fetch one page of entries, optionally restricted to `status`.
    ///
    /// `EntryPage::total` is the number of entries matching the filter across
    /// all pages.
    async fn fetch_entries(
        &self,
        status: Option<EntryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<EntryPage, SourceError>;

    /// Apply `status` to every entry in `entry_ids`. All or nothing.
    async fn update_entries(&self, entry_ids: &[i64], status: EntryStatus)
        -> Result<(), SourceError>;

    /// List the feeds known to the remote service.
    async fn feeds(&self) -> Result<Vec<Feed>, SourceError>;
}
