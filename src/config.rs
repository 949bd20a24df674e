pub mod router_config;

pub use router_config::{LinkConfig, RouterConfig};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::Ipv6Addr;
use std::path::Path;

use crate::error::{Result, SimError};

pub const DEFAULT_ROUTE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_ROUNDS: usize = 16;
/// Largest accepted timeout; keeps `now + timeout` representable as a timestamp.
pub const MAX_ROUTE_TIMEOUT_SECS: u64 = u32::MAX as u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seconds before a route through an offline next hop is invalidated on sweep
    #[serde(default = "default_route_timeout_secs")]
    pub route_timeout_secs: u64,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    pub routers: Vec<RouterConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

fn default_route_timeout_secs() -> u64 {
    DEFAULT_ROUTE_TIMEOUT_SECS
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let router = |name: &str, last: u16| {
            RouterConfig::new(name, Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, last))
        };

        Self {
            route_timeout_secs: DEFAULT_ROUTE_TIMEOUT_SECS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            routers: vec![router("A", 1), router("B", 2), router("C", 3), router("D", 4)],
            links: vec![
                LinkConfig::new("A", "B", 1),
                LinkConfig::new("B", "C", 2),
                LinkConfig::new("A", "D", 3),
                LinkConfig::new("C", "D", 4),
            ],
        }
    }
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn route_timeout(&self) -> Duration {
        Duration::seconds(self.route_timeout_secs as i64)
    }

    pub fn get_router(&self, name: &str) -> Option<&RouterConfig> {
        self.routers.iter().find(|r| r.name == name)
    }

    /// Rejects topologies the simulation cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.route_timeout_secs == 0 || self.route_timeout_secs > MAX_ROUTE_TIMEOUT_SECS {
            return Err(invalid(format!(
                "route timeout of {}s is out of range",
                self.route_timeout_secs
            )));
        }
        if self.max_rounds == 0 {
            return Err(invalid("max_rounds must be at least 1"));
        }

        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        for router in &self.routers {
            if router.name.trim().is_empty() {
                return Err(invalid("router name cannot be empty"));
            }
            if !names.insert(router.name.as_str()) {
                return Err(invalid(format!("duplicate router {}", router.name)));
            }
            if !addresses.insert(router.link_local_address) {
                return Err(invalid(format!(
                    "duplicate address {}",
                    router.link_local_address
                )));
            }
        }

        for link in &self.links {
            for end in [&link.a, &link.b] {
                if !names.contains(end.as_str()) {
                    return Err(invalid(format!("link references unknown router {}", end)));
                }
            }
            if link.a == link.b {
                return Err(invalid(format!("router {} cannot link to itself", link.a)));
            }
            link.validated_cost()?;
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SimError {
    SimError::InvalidConfiguration(message.into())
}
