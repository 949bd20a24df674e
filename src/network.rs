pub mod topology;

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_ROUTE_TIMEOUT_SECS;
use crate::error::{Result, SimError};
use crate::protocol::expiry::{self, ExpiredRoute};
use crate::router::Router;
use crate::{LinkLocalAddress, RouterId};

/// Owns every router of a simulation and resolves neighbor identities.
///
/// Routers never hold references to each other; a neighbor is a router id
/// looked up here when an update has to be delivered.
#[derive(Debug, Clone)]
pub struct Network {
    routers: Vec<Router>,
    index: HashMap<RouterId, usize>,
    route_timeout: Duration,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_ROUTE_TIMEOUT_SECS as i64))
    }
}

impl Network {
    pub fn new(route_timeout: Duration) -> Self {
        Self {
            routers: Vec::new(),
            index: HashMap::new(),
            route_timeout,
        }
    }

    pub fn route_timeout(&self) -> Duration {
        self.route_timeout
    }

    pub fn add_router(
        &mut self,
        id: impl Into<RouterId>,
        link_local_address: LinkLocalAddress,
    ) -> Result<()> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(SimError::InvalidConfiguration(format!(
                "duplicate router {}",
                id
            )));
        }
        if let Some(other) = self
            .routers
            .iter()
            .find(|r| r.link_local_address() == link_local_address)
        {
            return Err(SimError::InvalidConfiguration(format!(
                "address {} already used by router {}",
                link_local_address,
                other.id()
            )));
        }

        self.index.insert(id.clone(), self.routers.len());
        self.routers.push(Router::new(id, link_local_address));
        Ok(())
    }

    pub fn connect(&mut self, a: &str, b: &str, cost: u32) -> Result<()> {
        self.connect_at(a, b, cost, Utc::now())
    }

    /// Registers the link on both routers.
    pub fn connect_at(&mut self, a: &str, b: &str, cost: u32, now: DateTime<Utc>) -> Result<()> {
        let a_index = self.position(a)?;
        let b_index = self.position(b)?;
        let a_address = self.routers[a_index].link_local_address();
        let b_address = self.routers[b_index].link_local_address();

        self.routers[a_index].add_neighbor_at(b, b_address, cost, now)?;
        self.routers[b_index].add_neighbor_at(a, a_address, cost, now)?;
        Ok(())
    }

    pub fn router(&self, id: &str) -> Option<&Router> {
        self.index.get(id).map(|&i| &self.routers[i])
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    pub fn router_ids(&self) -> Vec<RouterId> {
        self.routers.iter().map(|r| r.id().to_string()).collect()
    }

    pub fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| SimError::UnknownRouter(id.to_string()))
    }

    pub fn send_update(&mut self, id: &str) -> Result<usize> {
        self.send_update_at(id, Utc::now())
    }

    /// Pushes a snapshot of the router's table to each of its neighbors in
    /// registration order. Returns how many receivers changed their table.
    pub fn send_update_at(&mut self, id: &str, now: DateTime<Utc>) -> Result<usize> {
        let sender_index = self.position(id)?;
        let Some(snapshot) = self.routers[sender_index].advertise() else {
            debug!(router = %id, "Router offline, no update sent");
            return Ok(0);
        };

        let neighbor_ids: Vec<RouterId> = self.routers[sender_index]
            .neighbors()
            .iter()
            .map(|n| n.router_id.clone())
            .collect();

        let mut changed = 0;
        for neighbor_id in neighbor_ids {
            let Some(&receiver_index) = self.index.get(&neighbor_id) else {
                warn!(router = %id, neighbor = %neighbor_id, "Neighbor not in network");
                continue;
            };

            let receiver = &mut self.routers[receiver_index];
            if !receiver.is_active() {
                debug!(router = %id, neighbor = %neighbor_id, "Skipping offline neighbor");
                continue;
            }

            if receiver.receive_update_at(id, &snapshot, now) {
                changed += 1;
            }
        }

        Ok(changed)
    }

    pub fn run_round(&mut self) -> Result<bool> {
        self.run_round_at(Utc::now())
    }

    /// One `send_update` from every router in network order. Returns whether
    /// any table changed.
    pub fn run_round_at(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let mut changed = 0;
        for id in self.router_ids() {
            changed += self.send_update_at(&id, now)?;
        }
        debug!(changed, "Update round finished");
        Ok(changed > 0)
    }

    /// Repeats rounds until one of them changes nothing. Returns the number
    /// of rounds executed, including the quiet one.
    pub fn run_until_converged(&mut self, max_rounds: usize) -> Result<usize> {
        self.run_until_converged_at(max_rounds, Utc::now())
    }

    pub fn run_until_converged_at(&mut self, max_rounds: usize, now: DateTime<Utc>) -> Result<usize> {
        for round in 1..=max_rounds {
            if !self.run_round_at(now)? {
                info!(rounds = round, "Network converged");
                return Ok(round);
            }
        }
        Err(SimError::NotConverged { rounds: max_rounds })
    }

    /// True when every active router that has an active neighbor reports
    /// no change from its latest update.
    pub fn has_converged(&self) -> bool {
        self.routers
            .iter()
            .filter(|r| r.is_active() && self.has_active_neighbor(r))
            .all(|r| r.has_converged())
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> Result<()> {
        self.set_active_at(id, active, Utc::now())
    }

    pub fn set_active_at(&mut self, id: &str, active: bool, now: DateTime<Utc>) -> Result<()> {
        let index = self.position(id)?;
        self.routers[index].set_active_at(active, now);
        Ok(())
    }

    pub fn offline_routers(&self) -> Vec<RouterId> {
        self.routers
            .iter()
            .filter(|r| !r.is_active())
            .map(|r| r.id().to_string())
            .collect()
    }

    pub fn expire_stale_routes(&mut self) -> Vec<ExpiredRoute> {
        self.expire_stale_routes_at(Utc::now())
    }

    /// Runs the stale-route sweep against every router currently offline.
    pub fn expire_stale_routes_at(&mut self, now: DateTime<Utc>) -> Vec<ExpiredRoute> {
        let offline = self.offline_routers();
        expiry::expire_stale_routes(&mut self.routers, &offline, self.route_timeout, now)
    }

    pub(crate) fn into_routers(self) -> (Vec<Router>, Duration) {
        (self.routers, self.route_timeout)
    }

    pub(crate) fn from_routers(routers: Vec<Router>, route_timeout: Duration) -> Self {
        let index = routers
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id().to_string(), i))
            .collect();
        Self {
            routers,
            index,
            route_timeout,
        }
    }

    fn has_active_neighbor(&self, router: &Router) -> bool {
        router
            .neighbors()
            .iter()
            .any(|n| self.router(&n.router_id).is_some_and(|r| r.is_active()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metric;
    use std::net::Ipv6Addr;

    fn addr(last: u16) -> Ipv6Addr {
        Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, last)
    }

    fn triangle() -> Network {
        let mut network = Network::default();
        network.add_router("A", addr(1)).unwrap();
        network.add_router("B", addr(2)).unwrap();
        network.add_router("C", addr(3)).unwrap();
        network.connect("A", "B", 1).unwrap();
        network.connect("B", "C", 1).unwrap();
        network.connect("A", "C", 5).unwrap();
        network
    }

    #[test]
    fn test_connect_registers_both_sides() {
        let network = triangle();
        let a = network.router("A").unwrap();
        let b = network.router("B").unwrap();
        assert_eq!(a.routing_table().get("B").unwrap().metric, Metric::Finite(1));
        assert_eq!(b.routing_table().get("A").unwrap().next_hop, Some(addr(1)));
    }

    #[test]
    fn test_duplicate_router_rejected() {
        let mut network = triangle();
        assert!(matches!(
            network.add_router("A", addr(9)),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            network.add_router("E", addr(1)),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_unknown_router_is_an_error() {
        let mut network = triangle();
        assert!(matches!(network.connect("A", "Z", 1), Err(SimError::UnknownRouter(_))));
        assert!(matches!(network.send_update("Z"), Err(SimError::UnknownRouter(_))));
        assert!(matches!(network.set_active("Z", false), Err(SimError::UnknownRouter(_))));
    }

    #[test]
    fn test_cheaper_indirect_path_wins() {
        let mut network = triangle();
        let rounds = network.run_until_converged(8).unwrap();
        assert!(rounds <= 3);
        assert!(network.has_converged());

        let a = network.router("A").unwrap();
        let to_c = a.routing_table().get("C").unwrap();
        assert_eq!(to_c.metric, Metric::Finite(2));
        assert_eq!(to_c.next_hop, Some(addr(2)));
    }

    #[test]
    fn test_offline_router_neither_sends_nor_receives() {
        let mut network = triangle();
        network.set_active("B", false).unwrap();

        assert_eq!(network.send_update("B").unwrap(), 0);
        let before = network.router("B").unwrap().routing_table().clone();
        network.send_update("A").unwrap();
        assert_eq!(network.router("B").unwrap().routing_table(), &before);
        assert_eq!(network.offline_routers(), vec!["B".to_string()]);
    }

    #[test]
    fn test_network_sweep_uses_configured_timeout() {
        let start = Utc::now();
        let mut network = Network::new(Duration::seconds(5));
        network.add_router("A", addr(1)).unwrap();
        network.add_router("B", addr(2)).unwrap();
        network.connect_at("A", "B", 1, start).unwrap();
        network.set_active_at("B", false, start).unwrap();

        assert!(network.expire_stale_routes_at(start + Duration::seconds(5)).is_empty());
        let expired = network.expire_stale_routes_at(start + Duration::seconds(6));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].router, "A");
        assert_eq!(expired[0].destination, "B");
    }
}
