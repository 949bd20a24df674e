pub mod expiry;
pub mod messages;
pub mod neighbor;
pub mod routing_table;
pub mod task_manager;

pub use expiry::{expire_stale_routes, ExpiredRoute};
pub use messages::RouterCommand;
pub use neighbor::Neighbor;
pub use routing_table::{RoutingEntry, RoutingTable};
pub use task_manager::NetworkRuntime;
