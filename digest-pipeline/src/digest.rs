use crate::pipeline::PipelineOutcome;
use crate::types::DigestRun;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// `"<prefix> - January 2, 2006"`
pub fn subject_line(prefix: &str, date: NaiveDate) -> String {
    format!("{} - {}", prefix, date.format("%B %-d, %Y"))
}

/// Package a finished run for the archive and the sinks.
///
/// Returns `None` when nothing was selected.
pub fn assemble_digest(outcome: PipelineOutcome, subject_prefix: &str, now: DateTime<Utc>) -> Option<DigestRun> {
    if outcome.is_empty() {
        return None;
    }

    Some(DigestRun {
        id: Uuid::new_v4(),
        subject: subject_line(subject_prefix, now.date_naive()),
        created_at: now,
        counters: outcome.counters,
        items: outcome.items,
    })
}
