//! External service clients.
//!
//! # Data Flow
//! ```text
//! caller (worker job, binary)
//!     → peer.rs / weather.rs (build request, pick fallback behavior)
//!     → resilience::ResilientCallPolicy (timeout, retry, breaker)
//!     → transport.rs (one HTTP attempt, classify status/body)
//!     → types.rs (decoded domain values)
//! ```
//!
//! # Design Decisions
//! - Fallback is a per-client policy: the peer client propagates failures,
//!   the weather client substitutes synthetic data
//! - Synthetic values are tagged (`Sourced::Synthetic`), never disguised
//! - Each client owns its own policy; breakers are never shared across
//!   dependencies

pub mod error;
pub mod peer;
pub mod transport;
pub mod types;
pub mod weather;

pub use error::ClientError;
pub use peer::{PeerServiceClient, UserDirectory, PEER_SERVICE};
pub use transport::HttpTransport;
pub use types::{NewUser, Sourced, User, WeatherData, WeatherReport};
pub use weather::{WeatherClient, WEATHER_SERVICE};
