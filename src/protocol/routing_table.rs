use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Metric;
use crate::{LinkLocalAddress, RouterId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub destination: RouterId,
    pub next_hop: Option<LinkLocalAddress>,
    pub metric: Metric,
    pub last_refresh: DateTime<Utc>,
}

impl RoutingEntry {
    pub fn route(
        destination: RouterId,
        next_hop: LinkLocalAddress,
        metric: Metric,
        now: DateTime<Utc>,
    ) -> Self {
        // An infinite metric never carries a next hop.
        if metric.is_infinite() {
            return Self::unreachable(destination, now);
        }

        Self {
            destination,
            next_hop: Some(next_hop),
            metric,
            last_refresh: now,
        }
    }

    pub fn unreachable(destination: RouterId, now: DateTime<Utc>) -> Self {
        Self {
            destination,
            next_hop: None,
            metric: Metric::Infinite,
            last_refresh: now,
        }
    }

    pub fn invalidate(&mut self, now: DateTime<Utc>) {
        self.next_hop = None;
        self.metric = Metric::Infinite;
        self.last_refresh = now;
    }

    pub fn is_reachable(&self) -> bool {
        !self.metric.is_infinite()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_refresh)
    }
}

/// Per-router table of best known routes.
///
/// Iteration follows insertion order so reports are deterministic. Entries
/// are never removed: an unreachable destination stays in the table with an
/// infinite metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: Vec<RoutingEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Inserts the entry, replacing any existing route to the same destination
    /// in place.
    pub fn upsert(&mut self, entry: RoutingEntry) {
        match self.find_route_index(&entry.destination) {
            Some(index) => self.routes[index] = entry,
            None => self.routes.push(entry),
        }
    }

    pub fn get(&self, destination: &str) -> Option<&RoutingEntry> {
        self.routes.iter().find(|route| route.destination == destination)
    }

    pub fn get_mut(&mut self, destination: &str) -> Option<&mut RoutingEntry> {
        self.routes
            .iter_mut()
            .find(|route| route.destination == destination)
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.find_route_index(destination).is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.routes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RoutingEntry> {
        self.routes.iter_mut()
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.destination.as_str())
    }

    fn find_route_index(&self, destination: &str) -> Option<usize> {
        self.routes
            .iter()
            .position(|route| route.destination == destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn addr(last: u16) -> Ipv6Addr {
        Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, last)
    }

    #[test]
    fn test_upsert_replaces_in_place_and_keeps_order() {
        let now = Utc::now();
        let mut table = RoutingTable::new();
        table.upsert(RoutingEntry::route("B".into(), addr(2), Metric::Finite(1), now));
        table.upsert(RoutingEntry::route("D".into(), addr(4), Metric::Finite(3), now));
        table.upsert(RoutingEntry::route("B".into(), addr(4), Metric::Finite(7), now));

        assert_eq!(table.len(), 2);
        let order: Vec<&str> = table.destinations().collect();
        assert_eq!(order, vec!["B", "D"]);
        assert_eq!(table.get("B").unwrap().next_hop, Some(addr(4)));
        assert_eq!(table.get("B").unwrap().metric, Metric::Finite(7));
    }

    #[test]
    fn test_infinite_route_has_no_next_hop() {
        let entry = RoutingEntry::route("C".into(), addr(3), Metric::Infinite, Utc::now());
        assert_eq!(entry.next_hop, None);
        assert!(!entry.is_reachable());
    }

    #[test]
    fn test_invalidate_refreshes_timestamp() {
        let then = Utc::now() - Duration::seconds(30);
        let now = Utc::now();
        let mut entry = RoutingEntry::route("C".into(), addr(3), Metric::Finite(2), then);
        assert!(entry.age(now) >= Duration::seconds(30));

        entry.invalidate(now);
        assert_eq!(entry.metric, Metric::Infinite);
        assert_eq!(entry.next_hop, None);
        assert_eq!(entry.last_refresh, now);
    }

    #[test]
    fn test_missing_destination() {
        let table = RoutingTable::new();
        assert!(table.is_empty());
        assert!(!table.contains("A"));
        assert!(table.get("A").is_none());
    }
}
