use assetlift_protocol::types::{CommitPayload, UploadPart};

use crate::TransferError;
use crate::validation::validate_parts;

/// Lifecycle of one multipart session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Begun on the server, no part sent yet.
    Pending,
    /// Parts are being uploaded.
    InFlight,
    Committed,
    Cancelled,
    /// The session failed and the cancel call failed too.
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Cancelled | Self::Failed)
    }
}

/// A server-tracked multipart session.
///
/// Once begun, a session must reach exactly one terminal state.
#[derive(Debug)]
pub struct UploadSession {
    id: String,
    parts: Vec<UploadPart>,
    state: SessionState,
}

impl UploadSession {
    pub fn new(id: String, parts: Vec<UploadPart>) -> Self {
        Self {
            id,
            parts,
            state: SessionState::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parts(&self) -> &[UploadPart] {
        &self.parts
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pending -> InFlight. Rejects a part list that is empty or not
    /// numbered `1..=n`.
    pub fn start(&mut self) -> Result<(), TransferError> {
        validate_parts(&self.parts)?;
        self.transition(SessionState::InFlight, |s| s == SessionState::Pending)
    }

    /// Checks that `payload` covers every part exactly once, then marks the
    /// session committed. Must be called after the commit call succeeded.
    pub fn mark_committed(&mut self, payload: &CommitPayload) -> Result<(), TransferError> {
        self.ensure_complete(payload)?;
        self.transition(SessionState::Committed, |s| s == SessionState::InFlight)
    }

    /// Verifies `payload` without changing state.
    pub fn ensure_complete(&self, payload: &CommitPayload) -> Result<(), TransferError> {
        let bad = payload.discrepancies(&self.parts);
        if bad.is_empty() {
            Ok(())
        } else {
            Err(TransferError::IncompletePayload(bad))
        }
    }

    pub fn mark_cancelled(&mut self) -> Result<(), TransferError> {
        self.transition(SessionState::Cancelled, |s| !s.is_terminal())
    }

    pub fn mark_failed(&mut self) -> Result<(), TransferError> {
        self.transition(SessionState::Failed, |s| !s.is_terminal())
    }

    fn transition(
        &mut self,
        to: SessionState,
        allowed: impl Fn(SessionState) -> bool,
    ) -> Result<(), TransferError> {
        if !allowed(self.state) {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
