//! The request pipeline and its construction.

pub mod audit;
mod builder;
pub mod fallback;
mod orchestrator;

pub use audit::{AuditRecord, AuditSink, TracingAuditSink};
pub use builder::{Medgate, MedgateBuilder};
pub use fallback::{FallbackAnswer, fallback_answer};
pub use orchestrator::{CACHE_OP_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, Orchestrator};
