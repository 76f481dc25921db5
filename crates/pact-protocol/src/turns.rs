use pact_core::types::ParticipantId;

/// Turn-order bookkeeping.
///
/// The first participant to act claims the turn; afterwards only the
/// current holder may act, and every successful action passes the turn to
/// the other side. The full holder history is kept for audits and
/// snapshots.
#[derive(Default)]
pub struct TurnEnforcer {
    current: Option<ParticipantId>,
    history: Vec<ParticipantId>,
}

impl TurnEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from snapshot state.
    pub fn restore(current: Option<ParticipantId>, history: Vec<ParticipantId>) -> Self {
        Self { current, history }
    }

    pub fn current(&self) -> Option<&ParticipantId> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[ParticipantId] {
        &self.history
    }

    /// Whether `participant` may act now. An unset turn is claimed by the
    /// first actor; a held turn admits only its holder.
    pub fn try_claim(&mut self, participant: &ParticipantId) -> bool {
        match &self.current {
            None => {
                self.current = Some(participant.clone());
                self.history.push(participant.clone());
                true
            }
            Some(holder) => holder == participant,
        }
    }

    /// Hand the turn to `next` after a successful action.
    pub fn pass_to(&mut self, next: &ParticipantId) {
        self.current = Some(next.clone());
        self.history.push(next.clone());
    }
}
