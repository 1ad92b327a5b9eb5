use std::collections::BTreeMap;

use web_time::Instant;

use crate::config::VerifierConfig;
use crate::error::VerifierError;
use crate::session::{
    CompletionCallback, SessionBinding, SessionPhase, StepReport, VerifierSession,
};
use crate::spatial::Position;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// All running verifier sessions, keyed by id.
///
/// The host calls [`SessionRegistry::step_all`] once per tick and forwards
/// live-world edits through [`SessionRegistry::broadcast_changed`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, VerifierSession>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and start a session. Nothing is registered if it fails to start.
    pub fn start(
        &mut self,
        config: VerifierConfig,
        binding: Option<SessionBinding>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<SessionId, VerifierError> {
        self.start_session(VerifierSession::new(config), binding, on_complete)
    }

    /// Like [`Self::start`], for a session built by the caller (e.g. with its own clock).
    pub fn start_session(
        &mut self,
        mut session: VerifierSession,
        binding: Option<SessionBinding>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<SessionId, VerifierError> {
        let binding = binding.ok_or(VerifierError::NothingSelected)?;
        session.start(binding, on_complete)?;

        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, session);
        log::debug!("registered verifier session {}", id.0);
        Ok(id)
    }

    pub fn session(&self, id: SessionId) -> Result<&VerifierSession, VerifierError> {
        self.sessions.get(&id).ok_or(VerifierError::UnknownSession(id))
    }

    pub fn session_mut(&mut self, id: SessionId) -> Result<&mut VerifierSession, VerifierError> {
        self.sessions
            .get_mut(&id)
            .ok_or(VerifierError::UnknownSession(id))
    }

    /// Reset and unregister a session. Later broadcasts no longer reach it.
    pub fn teardown(&mut self, id: SessionId) -> Result<(), VerifierError> {
        let mut session = self
            .sessions
            .remove(&id)
            .ok_or(VerifierError::UnknownSession(id))?;
        session.reset();
        log::debug!("tore down verifier session {}", id.0);
        Ok(())
    }

    /// Forward a live change to every session. Returns how many queued a recheck.
    pub fn broadcast_changed(&mut self, pos: Position) -> usize {
        self.prune_torn_down();
        self.sessions
            .values_mut()
            .map(|session| session.notify_changed(pos))
            .filter(|queued| *queued)
            .count()
    }

    pub fn step_all(&mut self, tick_start: Instant) -> Vec<(SessionId, StepReport)> {
        self.prune_torn_down();
        self.sessions
            .iter_mut()
            .map(|(id, session)| (*id, session.step(tick_start)))
            .collect()
    }

    /// Drop sessions that were reset in place through [`Self::session_mut`].
    fn prune_torn_down(&mut self) {
        self.sessions.retain(|id, session| {
            let keep = session.phase() != SessionPhase::TornDown;
            if !keep {
                log::debug!("dropped reset verifier session {}", id.0);
            }
            keep
        });
    }

    pub fn ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
