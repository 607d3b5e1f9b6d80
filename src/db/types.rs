use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "sessionstatus", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum SessionStatus {
    NotStarted,
    InProgress,
    Submitted,
    TimedOut,
    Cancelled,
}

impl SessionStatus {
    pub(crate) const NON_TERMINAL: [SessionStatus; 2] =
        [SessionStatus::NotStarted, SessionStatus::InProgress];

    pub(crate) fn is_terminal(self) -> bool {
        !Self::NON_TERMINAL.contains(&self)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "NOT_STARTED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Submitted => "SUBMITTED",
            SessionStatus::TimedOut => "TIMED_OUT",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "passingstatus", rename_all = "UPPERCASE")]
pub(crate) enum PassingStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "examgrade")]
pub(crate) enum Grade {
    #[serde(rename = "A+")]
    #[sqlx(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    #[sqlx(rename = "A")]
    A,
    #[serde(rename = "B+")]
    #[sqlx(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    #[sqlx(rename = "B")]
    B,
    #[serde(rename = "C+")]
    #[sqlx(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    #[sqlx(rename = "C")]
    C,
    #[serde(rename = "D")]
    #[sqlx(rename = "D")]
    D,
    #[serde(rename = "F")]
    #[sqlx(rename = "F")]
    F,
}

impl Grade {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}
