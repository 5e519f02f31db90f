//! Node selection against the load balancing service.

mod prober;
mod selector;

pub use prober::{HttpNodeProber, LATITUDE_HEADER, LONGITUDE_HEADER};
pub use selector::NodeSelector;
