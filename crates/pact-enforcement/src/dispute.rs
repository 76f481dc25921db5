use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pact_core::types::{now, ParticipantId, Timestamp};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Pending,
    Resolved,
}

/// A recorded disagreement between the two peers, carried until one side's
/// evidence settles it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dispute {
    pub dispute_id: String,
    pub reason: String,
    pub evidence: Value,
    pub created_at: Timestamp,
    pub status: DisputeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<ParticipantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
}

/// Dispute records keyed by id.
#[derive(Default)]
pub struct DisputeLog {
    disputes: HashMap<String, Dispute>,
}

impl DisputeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, dispute_id: &str, reason: impl Into<String>, evidence: Value) -> &Dispute {
        let dispute = Dispute {
            dispute_id: dispute_id.to_string(),
            reason: reason.into(),
            evidence,
            created_at: now(),
            status: DisputeStatus::Pending,
            resolution: None,
            winner: None,
            resolved_at: None,
        };
        self.disputes.insert(dispute_id.to_string(), dispute);
        &self.disputes[dispute_id]
    }

    /// Mark a dispute resolved; returns false for unknown ids.
    pub fn resolve(
        &mut self,
        dispute_id: &str,
        resolution: impl Into<String>,
        winner: Option<ParticipantId>,
    ) -> bool {
        match self.disputes.get_mut(dispute_id) {
            Some(dispute) => {
                dispute.status = DisputeStatus::Resolved;
                dispute.resolution = Some(resolution.into());
                dispute.winner = winner;
                dispute.resolved_at = Some(now());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, dispute_id: &str) -> Option<&Dispute> {
        self.disputes.get(dispute_id)
    }

    pub fn pending(&self) -> Vec<&Dispute> {
        self.disputes
            .values()
            .filter(|d| d.status == DisputeStatus::Pending)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_then_resolve() {
        let mut log = DisputeLog::new();
        log.open("d1", "conflicting result", json!({"cell": [1, 2]}));
        assert_eq!(log.pending().len(), 1);

        let winner = ParticipantId::new("a1b2c3d4e5f60718");
        assert!(log.resolve("d1", "proof replay favored claimant", Some(winner.clone())));
        assert!(log.pending().is_empty());
        let d = log.get("d1").unwrap();
        assert_eq!(d.status, DisputeStatus::Resolved);
        assert_eq!(d.winner.as_ref(), Some(&winner));
    }

    #[test]
    fn resolving_unknown_dispute_fails() {
        let mut log = DisputeLog::new();
        assert!(!log.resolve("nope", "n/a", None));
    }
}
