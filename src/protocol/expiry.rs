use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use crate::router::Router;
use crate::{LinkLocalAddress, RouterId};

/// Notification emitted for every route retired by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiredRoute {
    pub router: RouterId,
    pub destination: RouterId,
    pub via: LinkLocalAddress,
}

/// Sweeps every router's table against the routers listed as offline.
///
/// A route expires when its next hop is the address of an offline router,
/// its age is strictly greater than `timeout`, and it is still reachable.
/// Younger routes are left alone until a later sweep.
pub fn expire_stale_routes(
    routers: &mut [Router],
    offline_routers: &[RouterId],
    timeout: Duration,
    now: DateTime<Utc>,
) -> Vec<ExpiredRoute> {
    let offline_addresses: HashSet<LinkLocalAddress> = routers
        .iter()
        .filter(|router| offline_routers.iter().any(|id| id == router.id()))
        .map(|router| router.link_local_address())
        .collect();

    routers
        .iter_mut()
        .flat_map(|router| expire_routes_via(router, &offline_addresses, timeout, now))
        .collect()
}

/// Expires the stale routes of a single router whose next hop is one of
/// `offline_addresses`.
pub fn expire_routes_via(
    router: &mut Router,
    offline_addresses: &HashSet<LinkLocalAddress>,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Vec<ExpiredRoute> {
    let router_id = router.id().to_string();
    let mut expired = Vec::new();

    for entry in router.routing_table_mut().iter_mut() {
        let Some(next_hop) = entry.next_hop else {
            continue;
        };

        if offline_addresses.contains(&next_hop)
            && entry.age(now) > timeout
            && entry.is_reachable()
        {
            entry.invalidate(now);
            info!(
                router = %router_id,
                destination = %entry.destination,
                via = %next_hop,
                "Route expired (via offline router)"
            );
            expired.push(ExpiredRoute {
                router: router_id.clone(),
                destination: entry.destination.clone(),
                via: next_hop,
            });
        }
    }

    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metric;
    use std::net::Ipv6Addr;

    fn addr(last: u16) -> Ipv6Addr {
        Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, last)
    }

    fn line(start: DateTime<Utc>) -> Vec<Router> {
        // A -1- B -2- C, with A having learned C through B.
        let mut a = Router::new("A", addr(1));
        let mut b = Router::new("B", addr(2));
        let mut c = Router::new("C", addr(3));
        a.add_neighbor_at("B", addr(2), 1, start).unwrap();
        b.add_neighbor_at("A", addr(1), 1, start).unwrap();
        b.add_neighbor_at("C", addr(3), 2, start).unwrap();
        c.add_neighbor_at("B", addr(2), 2, start).unwrap();

        let snapshot = b.advertise().unwrap();
        a.receive_update_at("B", &snapshot, start);
        c.receive_update_at("B", &snapshot, start);
        vec![a, b, c]
    }

    #[test]
    fn test_routes_through_offline_router_expire_after_timeout() {
        let start = Utc::now();
        let mut routers = line(start);
        routers[1].set_active_at(false, start);

        let later = start + Duration::seconds(12);
        let expired = expire_stale_routes(&mut routers, &["B".to_string()], Duration::seconds(10), later);

        assert_eq!(expired.len(), 4);
        assert!(expired.iter().all(|e| e.via == addr(2)));
        for router in [&routers[0], &routers[2]] {
            for entry in router.routing_table().iter() {
                assert_eq!(entry.metric, Metric::Infinite);
                assert_eq!(entry.next_hop, None);
                assert_eq!(entry.last_refresh, later);
            }
        }
    }

    #[test]
    fn test_young_routes_survive_sweep() {
        let start = Utc::now();
        let mut routers = line(start);
        routers[1].set_active_at(false, start);

        let at_timeout = start + Duration::seconds(10);
        let expired = expire_stale_routes(&mut routers, &["B".to_string()], Duration::seconds(10), at_timeout);
        assert!(expired.is_empty());
        assert_eq!(routers[0].routing_table().get("C").unwrap().metric, Metric::Finite(3));
    }

    #[test]
    fn test_routes_via_online_routers_untouched() {
        let start = Utc::now();
        let mut routers = line(start);

        let later = start + Duration::seconds(60);
        let expired = expire_stale_routes(&mut routers, &[], Duration::seconds(10), later);
        assert!(expired.is_empty());
        assert_eq!(routers[2].routing_table().get("A").unwrap().metric, Metric::Finite(3));
    }

    #[test]
    fn test_sweep_does_not_repeat_for_expired_routes() {
        let start = Utc::now();
        let mut routers = line(start);
        routers[1].set_active_at(false, start);
        let offline = vec!["B".to_string()];

        let first = start + Duration::seconds(11);
        assert!(!expire_stale_routes(&mut routers, &offline, Duration::seconds(10), first).is_empty());

        let second = first + Duration::seconds(30);
        assert!(expire_stale_routes(&mut routers, &offline, Duration::seconds(10), second).is_empty());
    }
}
