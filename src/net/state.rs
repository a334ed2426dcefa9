use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::StateError;
use crate::net::session_ids::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ConnectionState {
    #[default]
    Base = 0,
    ReadyForInitialData = 1,
    WaitingForLoginData = 2,
    WaitingForCharacterSelect = 3,
    WaitingForIngameAck = 4,
    InGame = 5,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 6] = [
        ConnectionState::Base,
        ConnectionState::ReadyForInitialData,
        ConnectionState::WaitingForLoginData,
        ConnectionState::WaitingForCharacterSelect,
        ConnectionState::WaitingForIngameAck,
        ConnectionState::InGame,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<ConnectionState> {
        Self::ALL.get(usize::from(self.ordinal()) + 1).copied()
    }
}

#[derive(Debug, Clone, Default)]
struct SessionEntry {
    state: ConnectionState,
    login: Option<String>,
}

/// Per-session handshake state. Only the immediate successor of the stored
/// state is accepted by `transition`.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `session` at `Base`, replacing any stale entry.
    pub fn add(&self, session: SessionId) {
        self.lock().insert(session, SessionEntry::default());
    }

    pub fn transition(
        &self,
        session: SessionId,
        target: ConnectionState,
    ) -> Result<(), StateError> {
        let mut sessions = self.lock();
        let entry = sessions
            .get_mut(&session)
            .ok_or(StateError::UnknownSession(session))?;
        if entry.state.next() != Some(target) {
            return Err(StateError::Transition {
                session,
                from: entry.state,
                to: target,
            });
        }
        entry.state = target;
        Ok(())
    }

    pub fn get(&self, session: SessionId) -> Option<ConnectionState> {
        self.lock().get(&session).map(|entry| entry.state)
    }

    pub fn remove(&self, session: SessionId) -> Option<ConnectionState> {
        self.lock().remove(&session).map(|entry| entry.state)
    }

    /// Records the login for a tracked session. Unknown sessions are left
    /// alone and report `false`.
    pub fn set_authenticated_login(&self, session: SessionId, login: &str) -> bool {
        match self.lock().get_mut(&session) {
            Some(entry) => {
                entry.login = Some(login.to_string());
                true
            }
            None => false,
        }
    }

    pub fn authenticated_login(&self, session: SessionId) -> Option<String> {
        self.lock()
            .get(&session)
            .and_then(|entry| entry.login.clone())
    }

    pub fn snapshot(&self) -> Vec<(SessionId, ConnectionState)> {
        let mut out: Vec<_> = self
            .lock()
            .iter()
            .map(|(session, entry)| (*session, entry.state))
            .collect();
        out.sort_by_key(|(session, _)| *session);
        out
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
