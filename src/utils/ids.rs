//! Opaque identifiers for windows, panels and conversations.

use std::sync::atomic::{AtomicU64, Ordering};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate `<prefix>_<24 hex chars>`.
///
/// Falls back to a clock-and-counter mix if the OS random source is
/// unavailable; uniqueness within the process is all callers rely on.
pub fn generate_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    if getrandom::fill(&mut bytes).is_err() {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes();
        let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes();
        bytes[..8].copy_from_slice(&nanos);
        bytes[8..].copy_from_slice(&count[..4]);
    }
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{prefix}_{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_carry_prefix_and_are_unique() {
        let ids: HashSet<String> = (0..64).map(|_| generate_id("rw")).collect();
        assert_eq!(ids.len(), 64);
        for id in ids {
            assert!(id.starts_with("rw_"));
            assert_eq!(id.len(), 3 + 24);
        }
    }
}
