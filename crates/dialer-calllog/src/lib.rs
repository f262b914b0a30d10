//! Call log store.
//!
//! One row per call attempt. The browser controller creates the row once the
//! call has ended; two later, independent writers enrich it:
//!
//! | writer | columns | key |
//! |--------|---------|-----|
//! | recording webhook | `recording_url`, `recording_sid` | `provider_call_id` |
//! | transcription worker | `transcript`, `transcribed_at` | `provider_call_id` |
//!
//! The store does not order these writes. Enrichment against a row that does
//! not exist yet reports [`EnrichOutcome::NoMatchingRow`] and changes nothing;
//! re-applying the same enrichment reports [`EnrichOutcome::Unchanged`].
//! Enrichment columns are only ever set, never cleared.

mod error;
mod store;

pub use error::CallLogError;
pub use store::{
    attach_recording, attach_transcript, create_call_log, get_by_attempt_id,
    get_by_provider_call_id, list_for_seller, CallLogRecord, EnrichOutcome, NewCallLog,
    MAX_LIST_LIMIT,
};

#[cfg(test)]
mod tests;
