use crate::db::types::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEvent {
    Start,
    Submit,
    Expire,
    Cancel,
}

impl SessionEvent {
    #[cfg(test)]
    pub(crate) const ALL: [SessionEvent; 4] =
        [SessionEvent::Start, SessionEvent::Submit, SessionEvent::Expire, SessionEvent::Cancel];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SessionEvent::Start => "start",
            SessionEvent::Submit => "submit",
            SessionEvent::Expire => "expire",
            SessionEvent::Cancel => "cancel",
        }
    }
}

/// The whole state machine. `None` means the event is illegal from `from`.
pub(crate) fn next_status(from: SessionStatus, event: SessionEvent) -> Option<SessionStatus> {
    use SessionEvent::*;
    use SessionStatus::*;

    match (from, event) {
        (NotStarted, Start) => Some(InProgress),
        (InProgress, Submit) => Some(Submitted),
        (InProgress, Expire) => Some(TimedOut),
        (NotStarted | InProgress, Cancel) => Some(Cancelled),
        _ => None,
    }
}

/// Statuses from which `event` is legal, as used by conditional updates.
pub(crate) fn sources(event: SessionEvent) -> Vec<SessionStatus> {
    SessionStatus::NON_TERMINAL
        .into_iter()
        .filter(|status| next_status(*status, event).is_some())
        .collect()
}

/// Target status of `event`. Every event has exactly one.
pub(crate) fn target(event: SessionEvent) -> SessionStatus {
    match event {
        SessionEvent::Start => SessionStatus::InProgress,
        SessionEvent::Submit => SessionStatus::Submitted,
        SessionEvent::Expire => SessionStatus::TimedOut,
        SessionEvent::Cancel => SessionStatus::Cancelled,
    }
}
