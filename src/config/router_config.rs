use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::{LinkLocalAddress, RouterId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub name: RouterId,
    pub link_local_address: LinkLocalAddress,
}

impl RouterConfig {
    pub fn new(name: impl Into<RouterId>, link_local_address: LinkLocalAddress) -> Self {
        Self {
            name: name.into(),
            link_local_address,
        }
    }
}

/// Bidirectional link. The cost is kept signed so a negative value in a
/// config file is reported instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: RouterId,
    pub b: RouterId,
    pub cost: i64,
}

impl LinkConfig {
    pub fn new(a: impl Into<RouterId>, b: impl Into<RouterId>, cost: i64) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            cost,
        }
    }

    pub fn validated_cost(&self) -> Result<u32> {
        u32::try_from(self.cost).map_err(|_| {
            SimError::InvalidConfiguration(format!(
                "link {}-{} has invalid cost {}",
                self.a, self.b, self.cost
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_cost() {
        assert_eq!(LinkConfig::new("A", "B", 0).validated_cost().unwrap(), 0);
        assert!(LinkConfig::new("A", "B", -3).validated_cost().is_err());
        assert!(LinkConfig::new("A", "B", i64::from(u32::MAX) + 1).validated_cost().is_err());
    }
}
