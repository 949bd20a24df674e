pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod report;
pub mod router;
pub mod types;

pub use error::{Result, SimError};
pub use network::Network;
pub use router::Router;
pub use types::Metric;

pub type RouterId = String;
pub type LinkLocalAddress = std::net::Ipv6Addr;
