//! Instance sessions: the registry of live instances and the orchestrator
//! that moves them through their connection lifecycle.

pub mod bridge;
pub mod client;
pub mod errors;
mod guards;
pub mod handle;
pub mod orchestrator;
pub mod registry;
pub mod service;

pub use bridge::{BridgeClient, BridgeConfig};
pub use errors::{SessionError, SessionErrorKind};
pub use orchestrator::{SessionConfig, SessionOrchestrator};
pub use registry::{InstanceRegistry, RegistryError};
pub use service::{MockSessionService, SessionService, SessionStats};
