//! Paginated fetch → match → update loop.
//!
//! One [`Processor::process`] call is one run: it pages through the remote
//! entries, applies the first matching rule's action to each entry, and
//! returns the run's [`ProcessStats`]. Calls are strictly sequential; the
//! caller decides when (and whether) to run again.
use crate::matcher::Matcher;
use crate::source::{Entry, EntrySource, EntryStatus, SourceError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Entries requested per page.
pub const PAGE_SIZE: usize = 100;

/// Counters for a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub total_entries: usize,
    pub matched_entries: usize,
    pub marked_read: usize,
    pub removed: usize,
    pub errors: usize,
}

impl fmt::Display for ProcessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries checked, {} matched, {} marked read, {} removed, {} errors",
            self.total_entries, self.matched_entries, self.marked_read, self.removed, self.errors
        )
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    /// A page could not be fetched. The run stops; `stats` holds what was
    /// processed before the failure.
    #[error("Failed to fetch entries at offset {offset}: {source}")]
    Fetch {
        offset: usize,
        stats: ProcessStats,
        #[source]
        source: SourceError,
    },
}

impl ProcessError {
    /// Statistics accumulated before the run was aborted.
    pub fn stats(&self) -> &ProcessStats {
        match self {
            ProcessError::Fetch { stats, .. } => stats,
        }
    }
}

/// Map a normalized action to the remote status it sets.
fn resolve_action(action: &str) -> Option<EntryStatus> {
    match action {
        "read" => Some(EntryStatus::Read),
        "remove" => Some(EntryStatus::Removed),
        _ => None,
    }
}

pub struct Processor<S> {
    source: S,
    matcher: Arc<Matcher>,
    dry_run: bool,
}

impl<S: EntrySource> Processor<S> {
    pub fn new(source: S, matcher: Arc<Matcher>, dry_run: bool) -> Self {
        Self {
            source,
            matcher,
            dry_run,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run once over every relevant entry.
    ///
    /// Live runs only look at unread entries. Dry runs look at every entry,
    /// whatever its status, and never call `update_entries`.
    ///
    /// # Errors
    ///
    /// [`ProcessError::Fetch`] when a page fetch fails. Update failures and
    /// unknown actions are counted in [`ProcessStats::errors`] instead.
    pub async fn process(&self) -> Result<ProcessStats, ProcessError> {
        let mut stats = ProcessStats::default();
        let status = if self.dry_run {
            None
        } else {
            Some(EntryStatus::Unread)
        };

        let mut offset = 0;
        loop {
            let page = match self.source.fetch_entries(status, PAGE_SIZE, offset).await {
                Ok(page) => page,
                Err(source) => {
                    return Err(ProcessError::Fetch {
                        offset,
                        stats,
                        source,
                    })
                }
            };

            if page.entries.is_empty() {
                break;
            }

            tracing::debug!(
                offset = offset,
                count = page.entries.len(),
                total = page.total,
                "Fetched page of entries"
            );

            for entry in &page.entries {
                stats.total_entries += 1;
                self.process_entry(entry, &mut stats).await;
            }

            offset += page.entries.len();

            // A short page means the end even if `total` disagrees
            if offset >= page.total || page.entries.len() < PAGE_SIZE {
                break;
            }
        }

        tracing::info!(
            total = stats.total_entries,
            matched = stats.matched_entries,
            marked_read = stats.marked_read,
            removed = stats.removed,
            errors = stats.errors,
            dry_run = self.dry_run,
            "Processing complete: {}",
            stats
        );

        Ok(stats)
    }

    async fn process_entry(&self, entry: &Entry, stats: &mut ProcessStats) {
        let Some(matched) = self.matcher.match_entry(entry) else {
            return;
        };

        stats.matched_entries += 1;
        tracing::info!(
            rule = %matched.rule.name,
            entry_id = entry.id,
            feed = %entry.feed_title(),
            title = %entry.title,
            published = ?entry.published_at,
            "Rule matched entry"
        );

        let Some(status) = resolve_action(&matched.action) else {
            tracing::error!(
                rule = %matched.rule.name,
                action = %matched.action,
                entry_id = entry.id,
                "Unknown action"
            );
            stats.errors += 1;
            return;
        };

        match status {
            EntryStatus::Read => stats.marked_read += 1,
            EntryStatus::Removed => stats.removed += 1,
            EntryStatus::Unread => {}
        }

        if self.dry_run {
            let verb = match status {
                EntryStatus::Read => "mark read",
                _ => "remove",
            };
            tracing::info!(
                entry_id = entry.id,
                feed = %entry.feed_title(),
                title = %entry.title,
                "Dry run: would {} entry",
                verb
            );
            return;
        }

        if let Err(e) = self.source.update_entries(&[entry.id], status).await {
            tracing::warn!(entry_id = entry.id, error = %e, "Failed to update entry");
            stats.errors += 1;
            return;
        }

        tracing::info!(
            entry_id = entry.id,
            status = %status,
            "Applied action '{}'",
            matched.action
        );
    }
}
