use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::framework::RoutingSystem;

/// One directly attached neighbour, keyed in the router by the local port it
/// is reached through. Carries the cost of the link and the distance vector
/// last received over it.
#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Neighbour<T: RoutingSystem + ?Sized> {
    /// the local port; (port, neighbour) is 1:1 while the link is up
    pub port: T::Port,
    /// direct cost of the attached link. Lower is better.
    pub link_cost: u16,
    /// destination -> cost as this neighbour last advertised it, raw, not
    /// yet combined with the link cost. An advertisement at or above
    /// infinity deletes the entry.
    #[serde_as(as = "Vec<(_, _)>")]
    pub vector: HashMap<T::NodeAddress, u16>,
}
