//! Incoming chat request types

use serde::{Deserialize, Serialize};

use super::PatientContext;

/// Maximum number of prior turns a request carries.
///
/// Older turns are dropped when a longer history is attached.
pub const MAX_HISTORY_TURNS: usize = 20;

/// Audience of the answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// General health information, not tied to a person.
    #[default]
    Public,
    /// Personalised answer for the attached patient context.
    Private,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Public => "public",
            Mode::Private => "private",
        }
    }
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A prior exchange in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One question submitted to the pipeline.
///
/// ```rust
/// # use medgate::{ChatRequest, Mode, PatientContext};
/// let request = ChatRequest::new("user-42", "Is ibuprofen safe with my meds?")
///     .mode(Mode::Private)
///     .patient(PatientContext::new("patient-7").medication("warfarin"));
/// assert_eq!(request.patient_id(), Some("patient-7"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub caller_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientContext>,
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default)]
    pub mode: Mode,
}

impl ChatRequest {
    /// Create a public-mode request with no patient context or history.
    pub fn new(caller_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            message: message.into(),
            patient: None,
            history: Vec::new(),
            mode: Mode::default(),
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn patient(mut self, patient: PatientContext) -> Self {
        self.patient = Some(patient);
        self
    }

    /// Attach prior turns, keeping only the most recent [`MAX_HISTORY_TURNS`].
    pub fn history(mut self, history: Vec<Turn>) -> Self {
        let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
        self.history = history.into_iter().skip(skip).collect();
        self
    }

    pub fn patient_id(&self) -> Option<&str> {
        self.patient.as_ref().map(|p| p.id.as_str())
    }
}
