use thiserror::Error;

use crate::db::models::ExamSession;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("session {0} has expired")]
    Expired(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub(crate) fn session_not_found(id: &str) -> Self {
        Self::NotFound(format!("session {id}"))
    }

    /// Rejection for an event that the session's current status does not allow.
    pub(crate) fn not_allowed(session: &ExamSession, action: &str) -> Self {
        if session.status.is_terminal() {
            Self::InvalidState(format!(
                "session {} is already {}; cannot {action}",
                session.id, session.status
            ))
        } else {
            Self::InvalidState(format!(
                "session {} is {}; cannot {action}",
                session.id, session.status
            ))
        }
    }
}
