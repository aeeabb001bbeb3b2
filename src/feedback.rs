use educe::Educe;
use thiserror::Error;

use crate::framework::RoutingSystem;

/// Lookup failures surfaced by the read-side query methods. Absence of
/// state is an answer, not a fault: callers should treat these as
/// "unknown" and move on.
#[derive(Error)]
#[derive(Educe)]
#[educe(Debug)]
pub enum RoutingError<T: RoutingSystem + ?Sized> {
    /// No active link uses this port.
    #[error("no active link on the queried port")]
    NoSuchLink { port: T::Port },
    /// Nothing is known about this destination.
    #[error("no route entry for the queried destination")]
    NoRoute { destination: T::NodeAddress },
}
