//! playgate API - playback admission and routing service
//!
//! Answers the media server's viewer triggers with a cached allow/deny from
//! the authorization gate, and redirects playback requests to the best node
//! the load balancer knows for the stream.

#[macro_use]
mod macros;

pub mod auth;
pub mod authorizer;
pub mod balancer;
pub mod config;
pub mod error;
pub mod gate;
pub mod membership;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use auth::TokenVerifier;
pub use authorizer::{RequestAuthorizer, TriggerPayload};
pub use balancer::{HttpNodeProber, NodeSelector};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use gate::HttpGateClient;
pub use membership::{ClusterMembership, Member, MemberTable};
pub use routes::create_router;
pub use state::{ApiAuthorizer, ApiCache, ApiGate, ApiProber, ApiSelector, AppState};
