use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::framework::RoutingSystem;

/// Everything that travels between adjacent nodes.
#[derive(Educe, Serialize, Deserialize)]
#[educe(Clone(bound()))]
#[serde(bound = "")]
pub enum Packet<T: RoutingSystem + ?Sized> {
    /// a single, event-triggered update that should be sent immediately
    RouteUpdate(RouteAdvertisement<T>),
    /// periodic full-table update; the protocol's resynchronization mechanism
    BatchRouteUpdate { routes: Vec<RouteAdvertisement<T>> },
    /// a directly attached host announcing itself
    HostAnnounce { host: T::NodeAddress },
    /// data-plane traffic, forwarded by the route table
    Data(DataPacket<T>),
}

/// One (destination, cost) pair of a distance vector.
#[derive(Educe, Serialize, Deserialize)]
#[educe(Clone(bound()))]
#[serde(bound = "")]
pub struct RouteAdvertisement<T: RoutingSystem + ?Sized> {
    pub destination: T::NodeAddress,
    /// cost from the sender's point of view; at or above the receiver's
    /// configured infinity this is a retraction
    pub metric: u16,
}

#[derive(Educe, Serialize, Deserialize)]
#[educe(Clone(bound()))]
#[serde(bound = "")]
pub struct DataPacket<T: RoutingSystem + ?Sized> {
    pub source: T::NodeAddress,
    pub destination: T::NodeAddress,
    pub payload: Vec<u8>,
}

/// A packet queued by the router for the I/O layer to put on the wire.
#[derive(Educe, Serialize, Deserialize)]
#[educe(Clone(bound()))]
#[serde(bound = "")]
pub struct OutboundPacket<T: RoutingSystem + ?Sized> {
    /// send out this local port
    pub port: T::Port,
    pub packet: Packet<T>,
}
