//! playgate Core - Shared Types
//!
//! Error taxonomy, clock abstraction and the value types passed between the
//! decision cache, the request authorizer and the node selector. The only
//! behaviour here is the [`NodeProber`] seam; implementations live elsewhere.

pub mod clock;
pub mod error;
pub mod probe;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{
    ConfigError, ErrorClass, GateError, PlaygateError, PlaygateResult, ProbeError, RequestError,
    TokenError,
};
pub use probe::{NodeProber, ProbeFailure, ProbeRequest};
pub use types::{
    qualified_stream_id, strip_namespace, AccessCacheKey, GeoPoint, SelectionResult, TokenClaims,
    NAMESPACE_SEPARATOR,
};
