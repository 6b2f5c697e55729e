//! Correlation and trace identifier generation.
//!
//! A session keeps at most one exchange in flight, so identifiers only need
//! to be unique enough to spot stray frames; nothing is kept in a lookup
//! table.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::TryRngCore;
use rand::rngs::OsRng;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Source of correlation and trace identifiers.
#[cfg_attr(test, mockall::automock)]
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn next_id(&self) -> String;
}

/// Hex-encoded 16 byte identifiers from the operating system's CSPRNG.
///
/// When the OS refuses to supply randomness the current UTC timestamp is
/// hex-encoded instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> String {
        random_hex().unwrap_or_else(timestamp_hex)
    }
}

/// Deterministic identifiers `<prefix>-1`, `<prefix>-2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    /// Creates a generator whose identifiers start with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{value}", self.prefix)
    }
}

/// Generates one identifier with [`RandomIds`].
#[must_use]
pub fn new_id() -> String {
    RandomIds.next_id()
}

fn random_hex() -> Option<String> {
    let mut bytes = [0_u8; 16];
    OsRng.try_fill_bytes(&mut bytes).ok()?;
    Some(hex::encode(bytes))
}

fn timestamp_hex() -> String {
    let now = OffsetDateTime::now_utc();
    let stamp = now
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp_nanos().to_string());
    hex::encode(stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_32_hex_characters() {
        let id = RandomIds.next_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()), "{id}");
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn timestamp_fallback_is_hex() {
        let id = timestamp_hex();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()), "{id}");
        let decoded = hex::decode(&id).expect("valid hex");
        let text = String::from_utf8(decoded).expect("utf8 timestamp");
        assert!(text.contains('T'), "{text}");
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("corr");
        assert_eq!(ids.next_id(), "corr-1");
        assert_eq!(ids.next_id(), "corr-2");
    }
}
