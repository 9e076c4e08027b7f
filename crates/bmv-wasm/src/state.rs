//! Per-instance verification counters for the host layer.
//!
//! The verifier state itself lives in `bmv-core`; this only tracks what the
//! host has seen so it can surface progress and the last failure.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationProgress {
    /// Relay messages that verified and committed.
    pub relay_messages_accepted: u64,
    /// Relay messages rejected by verification.
    pub relay_messages_rejected: u64,
    /// Payloads delivered across all accepted relay messages.
    pub messages_delivered: u64,
    /// BMV error code of the most recent rejection.
    pub last_error_code: Option<u32>,
}

impl VerificationProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&mut self, delivered: usize) {
        self.relay_messages_accepted += 1;
        self.messages_delivered += delivered as u64;
    }

    pub fn record_rejected(&mut self, code: u32) {
        self.relay_messages_rejected += 1;
        self.last_error_code = Some(code);
    }

    /// Share of relay messages accepted (0.0 - 1.0).
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.relay_messages_accepted + self.relay_messages_rejected;
        if total == 0 {
            return 0.0;
        }
        self.relay_messages_accepted as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counters() {
        let mut progress = VerificationProgress::new();
        assert_eq!(progress.acceptance_rate(), 0.0);

        progress.record_accepted(2);
        progress.record_accepted(0);
        progress.record_rejected(7);
        assert_eq!(progress.relay_messages_accepted, 2);
        assert_eq!(progress.relay_messages_rejected, 1);
        assert_eq!(progress.messages_delivered, 2);
        assert_eq!(progress.last_error_code, Some(7));

        progress.record_accepted(1);
        assert_eq!(progress.acceptance_rate(), 0.75);
        // A later success does not clear the last failure
        assert_eq!(progress.last_error_code, Some(7));
    }

    #[test]
    fn test_progress_serializes_camel_case() {
        let mut progress = VerificationProgress::new();
        progress.record_rejected(3);
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["relayMessagesRejected"], 1);
        assert_eq!(json["lastErrorCode"], 3);
    }
}
