//! Public types for the Medgate API.

mod patient;
mod request;
mod response;
mod search;

pub use patient::PatientContext;
pub use request::{ChatRequest, MAX_HISTORY_TURNS, Mode, Role, Turn};
pub use response::{ChatOutcome, ChatResponse, FALLBACK_MODEL};
pub use search::{Citation, ResultKind, SearchResult};
