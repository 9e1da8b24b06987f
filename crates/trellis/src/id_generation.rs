//! Hash-based ID generation for internal records.
//!
//! IDs look like `{prefix}-{hash}` where the prefix names the record kind
//! (`epic`, `feat`, `task`) and the hash is a base36 rendering of a SHA256
//! digest over the tenant, kind, external id and a nonce. The hash grows from
//! 6 to 8 characters as the store fills up, and a nonce is bumped on
//! collision.
//!
//! # Example
//!
//! ```
//! use trellis::domain::{EntityKind, TenantId};
//! use trellis::id_generation::IdGenerator;
//!
//! let mut generator = IdGenerator::new(0);
//! let id = generator
//!     .generate(&TenantId::new("acme"), EntityKind::Feature, "bd-12")
//!     .unwrap();
//! assert!(id.starts_with("feat-"));
//! ```

use crate::domain::{EntityKind, TenantId};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;
const MAX_HASH_LENGTH: usize = 8;

/// Errors that can occur during ID generation
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Unable to generate a unique ID after exhausting all nonces and length increases
    #[error("Unable to generate unique ID after {attempts} attempts")]
    CollisionExhausted {
        /// Nonces tried at the final length
        attempts: u32,
    },

    /// Invalid length parameter
    #[error("Length must be greater than 0")]
    InvalidLength,
}

/// ID prefix for a record kind.
pub fn prefix_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Epic => "epic",
        EntityKind::Feature => "feat",
        EntityKind::Task => "task",
    }
}

/// Hash-based ID generator with collision detection.
///
/// Holds every ID it has produced or been told about, so one generator should
/// live as long as the store it serves.
#[derive(Debug, Default)]
pub struct IdGenerator {
    record_count: usize,
    existing_ids: HashSet<String>,
}

impl IdGenerator {
    /// Create a generator for a store currently holding `record_count` records.
    pub fn new(record_count: usize) -> Self {
        Self {
            record_count,
            existing_ids: HashSet::new(),
        }
    }

    /// Register an existing ID to prevent collisions
    pub fn register_id(&mut self, id: impl Into<String>) {
        self.existing_ids.insert(id.into());
        self.record_count = self.record_count.max(self.existing_ids.len());
    }

    /// Forget an ID, e.g. after the insert that claimed it was rolled back.
    pub fn release_id(&mut self, id: &str) {
        self.existing_ids.remove(id);
    }

    /// Generate a new unique ID for a record of `kind` imported from
    /// `external_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if every nonce collides at every length up to the
    /// maximum.
    pub fn generate(
        &mut self,
        tenant: &TenantId,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<String, IdGenerationError> {
        let mut length = self.adaptive_length();

        loop {
            for nonce in 0..MAX_NONCE {
                let id = hash_id(tenant, kind, external_id, nonce, length)?;
                if self.existing_ids.insert(id.clone()) {
                    if nonce > 0 {
                        debug!(nonce, length, "Generated unique ID after collision retries");
                    }
                    self.record_count += 1;
                    return Ok(id);
                }
            }

            if length >= MAX_HASH_LENGTH {
                return Err(IdGenerationError::CollisionExhausted {
                    attempts: MAX_NONCE,
                });
            }
            warn!(
                length,
                max_nonce = MAX_NONCE,
                "All nonces exhausted, increasing ID length"
            );
            length += 1;
        }
    }

    /// Hash length for the current store size.
    ///
    /// - up to 1,000 records: 6 chars
    /// - up to 10,000: 7 chars
    /// - beyond: 8 chars
    fn adaptive_length(&self) -> usize {
        match self.record_count {
            0..=1_000 => 6,
            1_001..=10_000 => 7,
            _ => MAX_HASH_LENGTH,
        }
    }
}

fn hash_id(
    tenant: &TenantId,
    kind: EntityKind,
    external_id: &str,
    nonce: u32,
    length: usize,
) -> Result<String, IdGenerationError> {
    let content = format!("{tenant}|{kind}|{external_id}|{nonce}");

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash_bytes = hasher.finalize();

    let hash_str = encode_base36(&hash_bytes[..8], length)?;
    Ok(format!("{}-{hash_str}", prefix_for(kind)))
}

/// Encode up to 8 bytes as a base36 string of exactly `length` characters.
fn encode_base36(bytes: &[u8], length: usize) -> Result<String, IdGenerationError> {
    if length == 0 {
        return Err(IdGenerationError::InvalidLength);
    }

    let mut n = bytes
        .iter()
        .fold(0u64, |acc, &byte| acc.wrapping_shl(8).wrapping_add(u64::from(byte)));

    let mut result = Vec::with_capacity(length);
    while result.len() < length {
        // n % 36 < 36, always a valid index
        result.push(char::from(BASE36_CHARS[(n % 36) as usize]));
        n /= 36;
    }
    result.reverse();
    Ok(result.into_iter().collect())
}

/// Check that `id` looks like an ID generated for `kind`.
pub fn validate_id(id: &str, kind: EntityKind) -> bool {
    let Some(hash) = id
        .strip_prefix(prefix_for(kind))
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return false;
    };

    (6..=MAX_HASH_LENGTH).contains(&hash.len())
        && hash
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}
