use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tokio::sync::oneshot;

use super::expiry::ExpiredRoute;
use super::routing_table::RoutingTable;
use crate::router::Router;
use crate::{LinkLocalAddress, RouterId};

/// Inbox message of a router task. Each task handles its inbox strictly in
/// arrival order.
#[derive(Debug)]
pub enum RouterCommand {
    /// Table snapshot pushed by a neighbor
    Deliver {
        from: RouterId,
        table: RoutingTable,
        now: DateTime<Utc>,
    },
    /// Push our table to every neighbor; replies with the number of
    /// snapshots enqueued. Receivers record their own changes for
    /// `TakeChanges`.
    SendUpdate {
        now: DateTime<Utc>,
        reply: oneshot::Sender<usize>,
    },
    SetActive {
        active: bool,
        now: DateTime<Utc>,
        reply: oneshot::Sender<()>,
    },
    Expire {
        offline_addresses: HashSet<LinkLocalAddress>,
        timeout: Duration,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Vec<ExpiredRoute>>,
    },
    /// Number of deliveries that changed the table since the last request
    TakeChanges { reply: oneshot::Sender<usize> },
    Snapshot { reply: oneshot::Sender<Router> },
    /// Stop the task; its router is returned through the join handle
    Shutdown,
}
