//! Translation between the external tracker's vocabulary and ours.
//!
//! Status mapping is total: anything unrecognised becomes
//! [`InternalStatus::Backlog`]. Priority mapping is partial: a value that is
//! not an integer in range or a `P<digit>` string is an error, never a default.

use crate::domain::external::ExternalPriority;
use crate::domain::{EntityKind, InternalStatus, MAX_PRIORITY, MIN_PRIORITY};
use thiserror::Error;

/// A priority value that could not be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unresolved priority {value}")]
pub struct PriorityError {
    /// The value as it appeared in the input
    pub value: String,
}

impl PriorityError {
    fn new(priority: &ExternalPriority) -> Self {
        Self {
            value: priority.to_string(),
        }
    }
}

/// Map an external status to the internal vocabulary.
///
/// Matching ignores surrounding whitespace and ASCII case, and treats `-` and
/// spaces as `_`, so `"In Progress"` and `"in-progress"` both match
/// `in_progress`.
pub fn map_status(external: &str, kind: EntityKind) -> InternalStatus {
    let normalized: String = external
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();

    match normalized.as_str() {
        "open" | "reopened" | "pending_internal_review" | "waiting_for_customer" | "rebuttal"
        | "blocked" | "deferred" => InternalStatus::Backlog,
        "in_progress" => InternalStatus::InProgress,
        "closed" | "resolved" => InternalStatus::Completed,
        "cancelled" | "canceled" => InternalStatus::Cancelled,
        _ => {
            tracing::debug!(
                status = external,
                kind = %kind,
                "Unknown status, defaulting to backlog"
            );
            InternalStatus::Backlog
        }
    }
}

/// Map an external priority to the internal `0..=4` scale.
///
/// Integers pass through when in range. Strings must be `P` (either case)
/// followed by a single digit in range, with optional surrounding whitespace.
///
/// # Errors
///
/// Returns [`PriorityError`] for anything else, including bare numeric
/// strings and out-of-range values.
pub fn map_priority(external: &ExternalPriority) -> Result<u8, PriorityError> {
    let value = match external {
        ExternalPriority::Number(n) => u8::try_from(*n).ok(),
        ExternalPriority::Text(s) => parse_p_notation(s),
    };

    value
        .filter(|p| (MIN_PRIORITY..=MAX_PRIORITY).contains(p))
        .ok_or_else(|| PriorityError::new(external))
}

fn parse_p_notation(raw: &str) -> Option<u8> {
    let mut chars = raw.trim().chars();
    let prefix = chars.next()?;
    let digit = chars.next()?;
    if chars.next().is_some() || !prefix.eq_ignore_ascii_case(&'p') {
        return None;
    }
    digit.to_digit(10).and_then(|d| u8::try_from(d).ok())
}
