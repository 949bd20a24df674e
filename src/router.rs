use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::protocol::{Neighbor, RoutingEntry, RoutingTable};
use crate::{LinkLocalAddress, RouterId};

/// A single distance-vector router.
///
/// The routing table is only ever mutated through the router's own methods.
/// Other routers contribute by handing a snapshot of *their* table to
/// [`Router::receive_update`].
#[derive(Debug, Clone)]
pub struct Router {
    id: RouterId,
    link_local_address: LinkLocalAddress,
    routing_table: RoutingTable,
    neighbors: Vec<Neighbor>,
    has_pending_changes: bool,
    is_active: bool,
}

impl Router {
    pub fn new(id: impl Into<RouterId>, link_local_address: LinkLocalAddress) -> Self {
        Self {
            id: id.into(),
            link_local_address,
            routing_table: RoutingTable::new(),
            neighbors: Vec::new(),
            // Nothing received yet, so nothing is known to be stable.
            has_pending_changes: true,
            is_active: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn link_local_address(&self) -> LinkLocalAddress {
        self.link_local_address
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn neighbor(&self, router_id: &str) -> Option<&Neighbor> {
        self.neighbors.iter().find(|n| n.router_id == router_id)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn has_pending_changes(&self) -> bool {
        self.has_pending_changes
    }

    pub fn add_neighbor(
        &mut self,
        neighbor_id: impl Into<RouterId>,
        neighbor_address: LinkLocalAddress,
        cost: u32,
    ) -> Result<()> {
        self.add_neighbor_at(neighbor_id, neighbor_address, cost, Utc::now())
    }

    /// Registers a one-sided link and seeds the neighbor as a directly
    /// reachable destination. The other side must register its own link.
    pub fn add_neighbor_at(
        &mut self,
        neighbor_id: impl Into<RouterId>,
        neighbor_address: LinkLocalAddress,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let neighbor_id = neighbor_id.into();
        if neighbor_id == self.id {
            return Err(SimError::InvalidConfiguration(format!(
                "router {} cannot be its own neighbor",
                self.id
            )));
        }

        let neighbor = Neighbor::new(neighbor_id.clone(), neighbor_address, cost);
        self.routing_table.upsert(RoutingEntry::route(
            neighbor_id.clone(),
            neighbor_address,
            neighbor.link_metric(),
            now,
        ));

        match self.neighbors.iter_mut().find(|n| n.router_id == neighbor_id) {
            Some(existing) => *existing = neighbor,
            None => self.neighbors.push(neighbor),
        }

        debug!(router = %self.id, neighbor = %neighbor_id, cost, "Neighbor registered");
        Ok(())
    }

    /// Snapshot of the table to push to neighbors, or `None` when the router
    /// is offline and must stay silent.
    pub fn advertise(&self) -> Option<RoutingTable> {
        if !self.is_active {
            return None;
        }
        Some(self.routing_table.clone())
    }

    pub fn receive_update(&mut self, sender_id: &str, sender_table: &RoutingTable) -> bool {
        self.receive_update_at(sender_id, sender_table, Utc::now())
    }

    /// Merges a neighbor's table into ours and returns whether anything
    /// changed. The result also replaces the pending-changes flag.
    pub fn receive_update_at(
        &mut self,
        sender_id: &str,
        sender_table: &RoutingTable,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(sender) = self.neighbor(sender_id).cloned() else {
            warn!(router = %self.id, sender = %sender_id, "Ignoring update from unknown neighbor");
            self.has_pending_changes = false;
            return false;
        };

        let mut updated = false;

        for entry in sender_table.iter() {
            if entry.destination == self.id {
                continue;
            }

            let candidate = sender.link_metric().saturating_add(entry.metric);

            let improves = match self.routing_table.get(&entry.destination) {
                Some(existing) => candidate < existing.metric,
                None => true,
            };

            if improves {
                debug!(
                    router = %self.id,
                    destination = %entry.destination,
                    via = %sender.router_id,
                    metric = %candidate,
                    "Route updated"
                );
                self.routing_table.upsert(RoutingEntry::route(
                    entry.destination.clone(),
                    sender.link_local_address,
                    candidate,
                    now,
                ));
                updated = true;
            }
        }

        self.has_pending_changes = updated;
        updated
    }

    pub fn has_converged(&self) -> bool {
        !self.has_pending_changes
    }

    pub fn set_active(&mut self, active: bool) {
        self.set_active_at(active, Utc::now());
    }

    /// Taking a router offline invalidates its whole table at once.
    /// Neighbors are not told; they find out through the stale-route sweep.
    pub fn set_active_at(&mut self, active: bool, now: DateTime<Utc>) {
        self.is_active = active;

        if active {
            info!(router = %self.id, "Router is back online");
            return;
        }

        for entry in self.routing_table.iter_mut() {
            entry.invalidate(now);
        }
        info!(router = %self.id, "Router has gone offline");
    }

    pub(crate) fn routing_table_mut(&mut self) -> &mut RoutingTable {
        &mut self.routing_table
    }
}
