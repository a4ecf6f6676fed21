pub mod config;
pub mod error;
pub mod models;
pub mod cloud_types;
pub mod transport;
pub mod orchestrator;
pub mod health;
pub mod settings;

pub use error::{Result, SearchError};
pub use models::{CategorizedResultSet, ResourceLink, SearchQuery};
pub use orchestrator::{OrchestratorOptions, SearchEvent, SearchOrchestrator, SessionOutcome};
pub use transport::{HttpTransport, SearchTransport};
