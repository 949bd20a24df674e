//! Concurrent rendition of the simulation: one tokio task per router.
//!
//! Every router owns its table inside its task and only sees other routers
//! through `Deliver` messages in its inbox. The driver awaits each
//! `SendUpdate` acknowledgement before issuing the next one, and senders
//! enqueue their snapshots before acknowledging, so per-inbox FIFO order
//! reproduces the synchronous `Network` schedule exactly.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::expiry::{self, ExpiredRoute};
use super::messages::RouterCommand;
use crate::error::{Result, SimError};
use crate::network::Network;
use crate::router::Router;
use crate::{LinkLocalAddress, RouterId};

type Inbox = mpsc::UnboundedSender<RouterCommand>;

struct RouterHandle {
    id: RouterId,
    link_local_address: LinkLocalAddress,
    neighbors: Vec<RouterId>,
    inbox: Inbox,
    task: JoinHandle<Router>,
}

pub struct NetworkRuntime {
    handles: Vec<RouterHandle>,
    offline: HashSet<RouterId>,
    route_timeout: Duration,
}

impl NetworkRuntime {
    /// Moves every router of the network into its own task. Must be called
    /// from within a tokio runtime.
    pub fn spawn(network: Network) -> Self {
        let (routers, route_timeout) = network.into_routers();

        let mut inboxes: HashMap<RouterId, Inbox> = HashMap::new();
        let mut receivers = Vec::with_capacity(routers.len());
        for router in &routers {
            let (tx, rx) = mpsc::unbounded_channel();
            inboxes.insert(router.id().to_string(), tx);
            receivers.push(rx);
        }

        let offline = routers
            .iter()
            .filter(|r| !r.is_active())
            .map(|r| r.id().to_string())
            .collect();

        let handles = routers
            .into_iter()
            .zip(receivers)
            .map(|(router, rx)| {
                let id = router.id().to_string();
                let link_local_address = router.link_local_address();
                let neighbors: HashMap<RouterId, Inbox> = router
                    .neighbors()
                    .iter()
                    .filter_map(|n| {
                        inboxes
                            .get(&n.router_id)
                            .map(|tx| (n.router_id.clone(), tx.clone()))
                    })
                    .collect();
                let neighbor_ids = router
                    .neighbors()
                    .iter()
                    .map(|n| n.router_id.clone())
                    .filter(|id| neighbors.contains_key(id))
                    .collect();
                let inbox = inboxes[&id].clone();
                let task = tokio::spawn(router_task(router, rx, neighbors));

                RouterHandle {
                    id,
                    link_local_address,
                    neighbors: neighbor_ids,
                    inbox,
                    task,
                }
            })
            .collect::<Vec<_>>();

        info!(routers = handles.len(), "All router tasks started");

        Self {
            handles,
            offline,
            route_timeout,
        }
    }

    pub fn router_ids(&self) -> Vec<RouterId> {
        self.handles.iter().map(|h| h.id.clone()).collect()
    }

    /// Same contract as [`Network::send_update_at`]: returns how many
    /// receivers changed their table.
    pub async fn send_update(&self, id: &str, now: DateTime<Utc>) -> Result<usize> {
        let handle = self.handle(id)?;
        request(&handle.inbox, |reply| RouterCommand::SendUpdate { now, reply }).await?;

        // Deliveries sit ahead of TakeChanges in each neighbor's inbox.
        let mut changed = 0;
        for neighbor in &handle.neighbors {
            let neighbor = self.handle(neighbor)?;
            if request(&neighbor.inbox, |reply| RouterCommand::TakeChanges { reply }).await? > 0 {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// One update from every router in order; returns whether any table
    /// changed during the round.
    pub async fn run_round(&self, now: DateTime<Utc>) -> Result<bool> {
        for handle in &self.handles {
            request(&handle.inbox, |reply| RouterCommand::SendUpdate { now, reply }).await?;
        }

        let mut changed = 0;
        for handle in &self.handles {
            changed += request(&handle.inbox, |reply| RouterCommand::TakeChanges { reply }).await?;
        }
        Ok(changed > 0)
    }

    pub async fn run_until_converged(&self, max_rounds: usize, now: DateTime<Utc>) -> Result<usize> {
        for round in 1..=max_rounds {
            if !self.run_round(now).await? {
                info!(rounds = round, "Network converged");
                return Ok(round);
            }
        }
        Err(SimError::NotConverged { rounds: max_rounds })
    }

    pub async fn set_active(&mut self, id: &str, active: bool, now: DateTime<Utc>) -> Result<()> {
        let handle = self.handle(id)?;
        request(&handle.inbox, |reply| RouterCommand::SetActive { active, now, reply }).await?;

        if active {
            self.offline.remove(id);
        } else {
            self.offline.insert(id.to_string());
        }
        Ok(())
    }

    pub async fn expire_stale_routes(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredRoute>> {
        let offline_addresses: HashSet<LinkLocalAddress> = self
            .handles
            .iter()
            .filter(|h| self.offline.contains(&h.id))
            .map(|h| h.link_local_address)
            .collect();

        let mut expired = Vec::new();
        for handle in &self.handles {
            let offline_addresses = offline_addresses.clone();
            let timeout = self.route_timeout;
            expired.extend(
                request(&handle.inbox, |reply| RouterCommand::Expire {
                    offline_addresses,
                    timeout,
                    now,
                    reply,
                })
                .await?,
            );
        }
        Ok(expired)
    }

    pub async fn snapshot(&self, id: &str) -> Result<Router> {
        let handle = self.handle(id)?;
        request(&handle.inbox, |reply| RouterCommand::Snapshot { reply }).await
    }

    pub async fn snapshot_all(&self) -> Result<Vec<Router>> {
        let mut routers = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            routers.push(request(&handle.inbox, |reply| RouterCommand::Snapshot { reply }).await?);
        }
        Ok(routers)
    }

    /// Stops every task and reassembles the network from the routers they
    /// owned.
    pub async fn shutdown(self) -> Result<Network> {
        for handle in &self.handles {
            handle
                .inbox
                .send(RouterCommand::Shutdown)
                .map_err(|_| SimError::RuntimeClosed)?;
        }

        let mut routers = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            routers.push(handle.task.await.map_err(|_| SimError::RuntimeClosed)?);
        }
        Ok(Network::from_routers(routers, self.route_timeout))
    }

    fn handle(&self, id: &str) -> Result<&RouterHandle> {
        self.handles
            .iter()
            .find(|h| h.id == id)
            .ok_or_else(|| SimError::UnknownRouter(id.to_string()))
    }
}

async fn request<T>(
    inbox: &Inbox,
    command: impl FnOnce(oneshot::Sender<T>) -> RouterCommand,
) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    inbox.send(command(tx)).map_err(|_| SimError::RuntimeClosed)?;
    rx.await.map_err(|_| SimError::RuntimeClosed)
}

async fn router_task(
    mut router: Router,
    mut inbox: mpsc::UnboundedReceiver<RouterCommand>,
    neighbors: HashMap<RouterId, Inbox>,
) -> Router {
    let mut changes = 0;

    while let Some(command) = inbox.recv().await {
        match command {
            RouterCommand::Deliver { from, table, now } => {
                if !router.is_active() {
                    continue;
                }
                if router.receive_update_at(&from, &table, now) {
                    changes += 1;
                }
            }
            RouterCommand::SendUpdate { now, reply } => {
                let mut sent = 0;
                if let Some(snapshot) = router.advertise() {
                    for neighbor in router.neighbors() {
                        let Some(tx) = neighbors.get(&neighbor.router_id) else {
                            continue;
                        };
                        let delivery = RouterCommand::Deliver {
                            from: router.id().to_string(),
                            table: snapshot.clone(),
                            now,
                        };
                        if tx.send(delivery).is_ok() {
                            sent += 1;
                        } else {
                            debug!(router = %router.id(), neighbor = %neighbor.router_id, "Neighbor task gone");
                        }
                    }
                }
                let _ = reply.send(sent);
            }
            RouterCommand::SetActive { active, now, reply } => {
                router.set_active_at(active, now);
                let _ = reply.send(());
            }
            RouterCommand::Expire {
                offline_addresses,
                timeout,
                now,
                reply,
            } => {
                let expired = expiry::expire_routes_via(&mut router, &offline_addresses, timeout, now);
                let _ = reply.send(expired);
            }
            RouterCommand::TakeChanges { reply } => {
                let _ = reply.send(std::mem::take(&mut changes));
            }
            RouterCommand::Snapshot { reply } => {
                let _ = reply.send(router.clone());
            }
            RouterCommand::Shutdown => break,
        }
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::types::Metric;

    fn demo() -> Network {
        Network::from_config(&SimulationConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_runtime_matches_synchronous_round() {
        let now = Utc::now();
        let mut expected = demo();
        expected.run_round_at(now).unwrap();

        let runtime = NetworkRuntime::spawn(demo());
        assert!(runtime.run_round(now).await.unwrap());

        for id in runtime.router_ids() {
            let router = runtime.snapshot(&id).await.unwrap();
            let sync = expected.router(&id).unwrap();
            let got: Vec<_> = router.routing_table().iter().map(|e| (e.destination.clone(), e.next_hop, e.metric)).collect();
            let want: Vec<_> = sync.routing_table().iter().map(|e| (e.destination.clone(), e.next_hop, e.metric)).collect();
            assert_eq!(got, want, "router {}", id);
        }
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_update_counts_changed_receivers() {
        let now = Utc::now();
        let mut expected = demo();
        let runtime = NetworkRuntime::spawn(demo());

        assert_eq!(runtime.send_update("A", now).await.unwrap(), 2);
        for id in expected.router_ids() {
            let want = expected.send_update_at(&id, now).unwrap();
            if id == "A" {
                continue;
            }
            assert_eq!(runtime.send_update(&id, now).await.unwrap(), want, "router {}", id);
        }

        // Nothing left over for the following rounds to count.
        assert_eq!(
            runtime.run_until_converged(8, now).await.unwrap(),
            expected.run_until_converged_at(8, now).unwrap()
        );
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_runtime_converges_and_shuts_down() {
        let runtime = NetworkRuntime::spawn(demo());
        let rounds = runtime.run_until_converged(8, Utc::now()).await.unwrap();
        assert!(rounds <= 3);

        let network = runtime.shutdown().await.unwrap();
        assert_eq!(network.router_ids(), vec!["A", "B", "C", "D"]);
        assert_eq!(
            network.router("A").unwrap().routing_table().get("C").unwrap().metric,
            Metric::Finite(3)
        );
    }

    #[tokio::test]
    async fn test_runtime_failure_and_expiry() {
        let mut runtime = NetworkRuntime::spawn(demo());
        runtime.run_until_converged(8, Utc::now()).await.unwrap();

        let now = Utc::now();
        runtime.set_active("B", false, now).await.unwrap();
        let expired = runtime
            .expire_stale_routes(now + Duration::seconds(12))
            .await
            .unwrap();
        assert!(!expired.is_empty());
        assert!(expired.iter().all(|e| e.via.to_string() == "fe80::2"));

        let b = runtime.snapshot("B").await.unwrap();
        assert!(b.routing_table().iter().all(|e| e.metric == Metric::Infinite));
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_router() {
        let runtime = NetworkRuntime::spawn(demo());
        assert!(matches!(
            runtime.snapshot("Z").await,
            Err(SimError::UnknownRouter(_))
        ));
        runtime.shutdown().await.unwrap();
    }
}
