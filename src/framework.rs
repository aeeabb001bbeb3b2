use std::cell::Cell;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Cost value representing "unreachable". Deliberately tiny: a retracted
/// route that counts up dies within a handful of exchanges instead of
/// crawling toward 2^16.
pub const DEFAULT_INFINITY: u16 = 16;
/// A route unconfirmed for this many time units is re-derived or dropped.
pub const DEFAULT_ROUTE_EXPIRY: u64 = 15;

pub trait RoutingSystem {
    /// Identity of a destination on the routing network, MUST be globally unique
    type NodeAddress: Ord + PartialOrd + DvData + DvKey;
    /// Identifier of a local port. Only meaningful to the node that owns it,
    /// and 1:1 with an attached link while that link is up
    type Port: DvData + DvKey;
    /// An opaque clock supplied by the I/O substrate
    type TimeSource: TimeSource;
    fn config() -> DvConfig {
        Default::default()
    }
}

pub trait DvData: Clone + Serialize + DeserializeOwned + Sized {}
pub trait DvKey: Eq + PartialEq + Hash {}
impl<T: Eq + PartialEq + Hash> DvKey for T {}
impl<T: Clone + Serialize + DeserializeOwned + Sized> DvData for T {}

/// Where the router reads the current time from. Must be monotonically
/// non-decreasing; the unit is whatever the substrate ticks in.
pub trait TimeSource: Default {
    fn now(&self) -> u64;
}

/// A caller-driven clock: the substrate sets the time explicitly before
/// handing events to the router. The natural time source for simulations,
/// and for substrates that already stamp their events.
#[derive(Default)]
pub struct ManualTime {
    time: Cell<u64>,
}

impl ManualTime {
    pub fn set(&self, now: u64) {
        self.time.set(now);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> u64 {
        self.time.get()
    }
}

/// Protocol parameters
#[derive(Clone, Serialize, Deserialize)]
pub struct DvConfig {
    /// the unreachable sentinel; costs saturate here
    pub infinity: u16,
    /// staleness threshold for route entries
    pub route_expiry: u64,
    /// advertise infinity back toward a route's own next hop. When false the
    /// advertisement is suppressed instead (split horizon, silent)
    pub poison_reverse: bool,
}

impl Default for DvConfig {
    fn default() -> Self {
        Self {
            infinity: DEFAULT_INFINITY,
            route_expiry: DEFAULT_ROUTE_EXPIRY,
            poison_reverse: true,
        }
    }
}
