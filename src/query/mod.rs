//! Turning a question into SQL, rows and a metrics record.

pub mod orchestrator;
pub mod table_selector;

pub use orchestrator::{QueryError, QueryOrchestrator, QueryOutcome};
