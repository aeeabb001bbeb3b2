use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::framework::RoutingSystem;

/// One best-route entry, the unit of the route table.
#[derive(Educe, Serialize, Deserialize)]
#[educe(Clone(bound()))]
#[serde(bound = "")]
pub struct Route<T: RoutingSystem + ?Sized> {
    /// cost to reach the destination, capped at the configured infinity
    pub metric: u16,
    /// local port of the selected next hop
    pub next_hop: T::Port,
    /// last time an advertisement (or host announcement) confirmed this entry
    pub last_refresh: u64,
    /// the destination is a directly attached host. Direct entries never
    /// expire and outrank anything a neighbour advertises
    pub direct: bool,
}
