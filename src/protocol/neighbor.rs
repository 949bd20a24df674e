use serde::{Deserialize, Serialize};

use crate::types::Metric;
use crate::{LinkLocalAddress, RouterId};

/// A direct link to an adjacent router. The neighbor is referenced by
/// identity only; the owning `Network` resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub router_id: RouterId,
    pub link_local_address: LinkLocalAddress,
    pub cost: u32,
}

impl Neighbor {
    pub fn new(router_id: RouterId, link_local_address: LinkLocalAddress, cost: u32) -> Self {
        Self {
            router_id,
            link_local_address,
            cost,
        }
    }

    pub fn link_metric(&self) -> Metric {
        Metric::Finite(self.cost)
    }
}
