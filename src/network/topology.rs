use chrono::{DateTime, Utc};
use tracing::info;

use super::Network;
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::RouterId;

/// An undirected link as seen from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub a: RouterId,
    pub b: RouterId,
    pub cost: u32,
}

impl Network {
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        Self::from_config_at(config, Utc::now())
    }

    /// Builds and wires every router of the config after validating it.
    pub fn from_config_at(config: &SimulationConfig, now: DateTime<Utc>) -> Result<Self> {
        config.validate()?;

        let mut network = Network::new(config.route_timeout());
        for router in &config.routers {
            network.add_router(router.name.clone(), router.link_local_address)?;
        }
        for link in &config.links {
            network.connect_at(&link.a, &link.b, link.validated_cost()?, now)?;
        }

        info!(
            routers = config.routers.len(),
            links = config.links.len(),
            "Topology built"
        );
        Ok(network)
    }

    /// Every link once, in the order the first endpoint registered it.
    pub fn links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = Vec::new();
        for router in self.routers() {
            for neighbor in router.neighbors() {
                let seen = links.iter().any(|l| {
                    (l.a == router.id() && l.b == neighbor.router_id)
                        || (l.b == router.id() && l.a == neighbor.router_id)
                });
                if !seen {
                    links.push(Link {
                        a: router.id().to_string(),
                        b: neighbor.router_id.clone(),
                        cost: neighbor.cost,
                    });
                }
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::error::SimError;

    #[test]
    fn test_default_config_builds_four_nodes() {
        let network = Network::from_config(&SimulationConfig::default()).unwrap();
        assert_eq!(network.router_ids(), vec!["A", "B", "C", "D"]);
        assert_eq!(network.links().len(), 4);
        assert_eq!(network.router("A").unwrap().neighbors().len(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SimulationConfig::default();
        config.links.push(LinkConfig::new("B", "D", -2));
        assert!(matches!(
            Network::from_config(&config),
            Err(SimError::InvalidConfiguration(_))
        ));
    }
}
