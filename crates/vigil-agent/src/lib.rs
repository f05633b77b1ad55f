// ABOUTME: Library surface of the vigil agent.
// ABOUTME: Session state machine, reconnect policy, discovery client, and provider seams.

pub mod backoff;
pub mod config;
pub mod discover;
pub mod error;
pub mod providers;
pub mod session;

pub use backoff::Backoff;
pub use config::AgentConfig;
pub use error::AgentError;
pub use providers::{DiagnosticsProvider, MetricsProvider, Providers, SysinfoProvider};
pub use session::{run_forever, run_once};
