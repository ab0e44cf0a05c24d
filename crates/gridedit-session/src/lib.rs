pub mod config;
pub mod http;
pub mod session;
pub mod store;

pub use config::{SessionConfig, StructuralSync};
pub use http::HttpGridStore;
pub use session::{Activation, EditSession, Reconciliation, SyncOutcome};
pub use store::RemoteGridStore;
