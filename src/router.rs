use crate::concepts::neighbour::Neighbour;
use crate::concepts::packet::{DataPacket, OutboundPacket, Packet, RouteAdvertisement};
use crate::concepts::route::Route;
use crate::feedback::RoutingError;
use crate::framework::{DvConfig, RoutingSystem, TimeSource};
use crate::router::RelaxOutcome::{Adopt, Keep, Refresh, Retract};
use crate::util::sum_inf;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::serde_as;
use std::collections::HashMap;

#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Router<T: RoutingSystem + ?Sized> {
    /// this node's own identity on the network
    pub address: T::NodeAddress,
    /// one entry per active link, keyed by local port; each neighbour holds
    /// the link cost and the distance vector last received from it
    #[serde_as(as = "Vec<(_, _)>")]
    pub links: HashMap<T::Port, Neighbour<T>>,
    /// destination -> best known route, the single source of truth for
    /// forwarding decisions
    #[serde_as(as = "Vec<(_, _)>")]
    pub routes: HashMap<T::NodeAddress, Route<T>>,
    /// directly attached hosts and the port they were announced on
    #[serde_as(as = "Vec<(_, _)>")]
    pub hosts: HashMap<T::NodeAddress, T::Port>,
    /// packets queued for the I/O layer to put on the wire
    pub outbound_packets: Vec<OutboundPacket<T>>,
    /// data packets addressed to this node, waiting for local consumption
    pub delivered: Vec<DataPacket<T>>,
    pub config: DvConfig,
    #[serde(skip_serializing, skip_deserializing)]
    pub clock: T::TimeSource,
}

#[derive(Eq, PartialEq)]
enum RelaxOutcome {
    /// take the candidate as the new best route
    Adopt,
    /// nothing new, just confirm the entry
    Refresh,
    /// the incumbent next hop withdrew the route
    Retract,
    Keep,
}

impl<T: RoutingSystem> Router<T> {
    pub fn new(address: T::NodeAddress) -> Self {
        Self {
            address,
            links: HashMap::new(),
            routes: HashMap::new(),
            hosts: HashMap::new(),
            outbound_packets: Vec::new(),
            delivered: Vec::new(),
            config: T::config(),
            clock: Default::default(),
        }
    }

    // region Boundary events

    /// Called by the I/O layer when a link comes up, or when the cost of an
    /// existing link changes. Idempotent for a repeated (port, cost) pair.
    pub fn handle_link_up(&mut self, port: T::Port, cost: u16) {
        if cost == 0 {
            // harmless for a host attachment, loop-prone for a transit link
            warn!("link on port {} came up with zero cost", json!(port));
        }
        if let Some(neigh) = self.links.get_mut(&port) {
            if neigh.link_cost == cost {
                return;
            }
            neigh.link_cost = cost;
            self.reconsider_port(&port);
        } else {
            self.links.insert(
                port.clone(),
                Neighbour {
                    port: port.clone(),
                    link_cost: cost,
                    vector: HashMap::new(),
                },
            );
            // bring the new neighbour up to date right away instead of
            // making it wait for the next periodic broadcast
            self.send_full_table(&port);
        }
    }

    /// Called by the I/O layer when a link goes away. Every route that was
    /// using it is re-derived from the surviving neighbours or retracted.
    pub fn handle_link_down(&mut self, port: &T::Port) {
        if self.links.remove(port).is_none() {
            return;
        }
        self.hosts.retain(|_, p| *p != *port);

        let now = self.clock.now();
        let orphaned: Vec<T::NodeAddress> = self
            .routes
            .iter()
            .filter(|(_, route)| route.next_hop == *port)
            .map(|(dest, _)| dest.clone())
            .collect();
        for dest in orphaned {
            self.reroute(&dest, Some(port), now);
        }
    }

    /// Called by the I/O layer for every inbound packet.
    pub fn handle_packet(&mut self, packet: &Packet<T>, port: &T::Port) {
        match packet {
            Packet::RouteUpdate(ad) => self.handle_advertisement(ad, port),
            Packet::BatchRouteUpdate { routes } => {
                for ad in routes {
                    self.handle_advertisement(ad, port);
                }
            }
            Packet::HostAnnounce { host } => self.handle_host_announce(host, port),
            Packet::Data(data) => self.handle_data(data, port),
        }
    }

    /// Called by the scheduling substrate at a fixed interval: expires stale
    /// entries, then re-broadcasts the full table to every neighbour.
    pub fn handle_timer(&mut self) {
        self.expire_routes();
        self.broadcast_routes();
    }
    // endregion

    // region Route computation

    /// Records an advertisement in the neighbour's vector and runs one
    /// relaxation step for the destination it names.
    fn handle_advertisement(&mut self, ad: &RouteAdvertisement<T>, port: &T::Port) {
        if ad.destination == self.address {
            return; // nobody needs a route to themselves
        }
        let inf = self.config.infinity;
        let now = self.clock.now();
        let candidate = {
            let Some(neigh) = self.links.get_mut(port) else {
                // raced a link-down notification; nothing to relax against
                return;
            };
            let advertised = ad.metric.min(inf);
            if advertised >= inf {
                neigh.vector.remove(&ad.destination);
            } else {
                neigh.vector.insert(ad.destination.clone(), advertised);
            }
            sum_inf(neigh.link_cost, advertised, inf)
        };
        self.relax(&ad.destination, port, candidate, now);
    }

    /// One Bellman-Ford relaxation step for `dest` given a candidate cost
    /// through `via`. Advertises whatever changed.
    fn relax(&mut self, dest: &T::NodeAddress, via: &T::Port, candidate: u16, now: u64) {
        match self.classify(dest, via, candidate) {
            Adopt => {
                self.routes.insert(
                    dest.clone(),
                    Route {
                        metric: candidate,
                        next_hop: via.clone(),
                        last_refresh: now,
                        direct: false,
                    },
                );
                trace!("route to {} is now {}", json!(dest), candidate);
                self.advertise_route(dest, candidate, Some(via));
            }
            Refresh => {
                if let Some(route) = self.routes.get_mut(dest) {
                    route.last_refresh = now;
                }
            }
            Retract => self.reroute(dest, Some(via), now),
            Keep => {}
        }
    }

    fn classify(&self, dest: &T::NodeAddress, via: &T::Port, candidate: u16) -> RelaxOutcome {
        let inf = self.config.infinity;
        match self.routes.get(dest) {
            None => {
                // first finite offer for a brand-new destination installs it
                if candidate < inf {
                    Adopt
                } else {
                    Keep
                }
            }
            // the attached link is authoritative for its own host
            Some(route) if route.direct => Keep,
            Some(route) if route.next_hop == *via => {
                if candidate >= inf {
                    Retract
                } else if candidate == route.metric {
                    Refresh
                } else {
                    // the next hop's own word overrides, better or worse;
                    // holding on to the old cost is how tables get stuck
                    Adopt
                }
            }
            Some(route) => {
                // a third party has to be strictly better, ties keep the
                // incumbent route stable
                if candidate < route.metric {
                    Adopt
                } else {
                    Keep
                }
            }
        }
    }

    /// Re-derives the route for `dest` from the surviving neighbours,
    /// optionally ignoring one port. When nobody offers a finite path the
    /// entry is poisoned to every neighbour and dropped.
    fn reroute(&mut self, dest: &T::NodeAddress, exclude: Option<&T::Port>, now: u64) {
        let inf = self.config.infinity;
        if let Some((port, metric)) = self.best_alternative(dest, exclude) {
            let changed = self
                .routes
                .get(dest)
                .map_or(true, |route| route.metric != metric || route.next_hop != port);
            self.routes.insert(
                dest.clone(),
                Route {
                    metric,
                    next_hop: port.clone(),
                    last_refresh: now,
                    direct: false,
                },
            );
            if changed {
                self.advertise_route(dest, metric, Some(&port));
            }
        } else if self.routes.remove(dest).is_some() {
            debug!("no path left to {}, retracting", json!(dest));
            self.advertise_route(dest, inf, None);
        }
    }

    /// Minimum of link cost + advertised cost over every neighbour with a
    /// vector entry for `dest`, optionally excluding one port. None when no
    /// neighbour offers a finite path.
    pub fn best_alternative(
        &self,
        dest: &T::NodeAddress,
        exclude: Option<&T::Port>,
    ) -> Option<(T::Port, u16)> {
        let inf = self.config.infinity;
        let mut best: Option<(T::Port, u16)> = None;
        for (port, neigh) in &self.links {
            if Some(port) == exclude {
                continue;
            }
            if let Some(advertised) = neigh.vector.get(dest) {
                let total = sum_inf(neigh.link_cost, *advertised, inf);
                if total >= inf {
                    continue;
                }
                if best.as_ref().map_or(true, |(_, b)| total < *b) {
                    best = Some((port.clone(), total));
                }
            }
        }
        best
    }

    /// Re-runs the relaxation for everything a neighbour has advertised,
    /// after the cost of its link changed.
    fn reconsider_port(&mut self, port: &T::Port) {
        let now = self.clock.now();
        let inf = self.config.infinity;
        let Some(neigh) = self.links.get(port) else {
            return;
        };
        let link_cost = neigh.link_cost;
        let candidates: Vec<(T::NodeAddress, u16)> = neigh
            .vector
            .iter()
            .map(|(dest, advertised)| (dest.clone(), sum_inf(link_cost, *advertised, inf)))
            .collect();
        for (dest, candidate) in candidates {
            self.relax(&dest, port, candidate, now);
        }
        // directly attached hosts ride the link cost too
        let attached: Vec<T::NodeAddress> = self
            .hosts
            .iter()
            .filter(|(_, p)| **p == *port)
            .map(|(host, _)| host.clone())
            .collect();
        for host in attached {
            let changed = self
                .routes
                .get(&host)
                .map_or(true, |route| route.metric != link_cost);
            self.routes.insert(
                host.clone(),
                Route {
                    metric: link_cost,
                    next_hop: port.clone(),
                    last_refresh: now,
                    direct: true,
                },
            );
            if changed {
                self.advertise_route(&host, link_cost, Some(port));
            }
        }
    }

    /// Drops or re-derives entries whose confirmation has gone stale.
    fn expire_routes(&mut self) {
        let now = self.clock.now();
        let expiry = self.config.route_expiry;
        let stale: Vec<(T::NodeAddress, T::Port)> = self
            .routes
            .iter()
            .filter(|(_, route)| {
                !route.direct && now.saturating_sub(route.last_refresh) >= expiry
            })
            .map(|(dest, route)| (dest.clone(), route.next_hop.clone()))
            .collect();
        for (dest, hop) in stale {
            debug!("route to {} went stale", json!(dest));
            // the incumbent stopped confirming this destination, so its old
            // word no longer counts as an alternative
            if let Some(neigh) = self.links.get_mut(&hop) {
                neigh.vector.remove(&dest);
            }
            self.reroute(&dest, None, now);
        }
    }
    // endregion

    // region Host discovery

    /// A directly attached host announced itself: remember which port it
    /// lives on and install a direct route at the raw link cost.
    fn handle_host_announce(&mut self, host: &T::NodeAddress, port: &T::Port) {
        if *host == self.address {
            return;
        }
        let Some(neigh) = self.links.get(port) else {
            return;
        };
        let cost = neigh.link_cost;
        let now = self.clock.now();
        self.hosts.insert(host.clone(), port.clone());
        let changed = self.routes.get(host).map_or(true, |route| {
            !route.direct || route.metric != cost || route.next_hop != *port
        });
        self.routes.insert(
            host.clone(),
            Route {
                metric: cost,
                next_hop: port.clone(),
                last_refresh: now,
                direct: true,
            },
        );
        if changed {
            debug!("host {} attached locally", json!(host));
            self.advertise_route(host, cost, Some(port));
        }
    }
    // endregion

    // region Data plane

    /// Forwards a data packet using the route table, falling back to a flood
    /// when the destination is unknown.
    fn handle_data(&mut self, data: &DataPacket<T>, arrival: &T::Port) {
        if data.destination == self.address {
            self.delivered.push(data.clone());
            return;
        }
        if let Some(port) = self.hosts.get(&data.destination).cloned() {
            self.send(Packet::Data(data.clone()), port);
            return;
        }
        let inf = self.config.infinity;
        let via = match self.routes.get(&data.destination) {
            Some(route) => {
                if route.metric >= inf || route.next_hop == *arrival {
                    // the only route points straight back where the packet
                    // came from, or is poisoned; drop instead of looping
                    trace!("dropping data for {}", json!(&data.destination));
                    return;
                }
                Some(route.next_hop.clone())
            }
            None => None,
        };
        match via {
            Some(port) => self.send(Packet::Data(data.clone()), port),
            None => self.flood(Packet::Data(data.clone()), Some(arrival)),
        }
    }
    // endregion

    // region Advertisement propagation

    /// Sends one route to every neighbour. The copy that would go back out
    /// the route's own next hop is poisoned to infinity, or suppressed
    /// entirely under split horizon.
    pub fn advertise_route(
        &mut self,
        dest: &T::NodeAddress,
        metric: u16,
        next_hop: Option<&T::Port>,
    ) {
        for port in self.links.keys() {
            let metric = if next_hop == Some(port) {
                if self.config.poison_reverse {
                    self.config.infinity
                } else {
                    continue;
                }
            } else {
                metric
            };
            self.outbound_packets.push(OutboundPacket {
                port: port.clone(),
                packet: Packet::RouteUpdate(RouteAdvertisement {
                    destination: dest.clone(),
                    metric,
                }),
            });
        }
    }

    /// Queues the periodic full-table update, one batch per neighbour with
    /// the reverse policy applied per route.
    pub fn broadcast_routes(&mut self) {
        let ports: Vec<T::Port> = self.links.keys().cloned().collect();
        for port in ports {
            let routes = self.table_for(&port);
            self.outbound_packets.push(OutboundPacket {
                port,
                packet: Packet::BatchRouteUpdate { routes },
            });
        }
    }

    /// The advertisements one neighbour should see.
    fn table_for(&self, port: &T::Port) -> Vec<RouteAdvertisement<T>> {
        let mut routes = Vec::new();
        for (dest, route) in &self.routes {
            let metric = if route.next_hop == *port {
                if self.config.poison_reverse {
                    self.config.infinity
                } else {
                    continue;
                }
            } else {
                route.metric
            };
            routes.push(RouteAdvertisement {
                destination: dest.clone(),
                metric,
            });
        }
        routes
    }

    fn send_full_table(&mut self, port: &T::Port) {
        let routes = self.table_for(port);
        self.outbound_packets.push(OutboundPacket {
            port: port.clone(),
            packet: Packet::BatchRouteUpdate { routes },
        });
    }

    /// Queues a unicast packet on one port.
    pub fn send(&mut self, packet: Packet<T>, port: T::Port) {
        self.outbound_packets.push(OutboundPacket { port, packet });
    }

    /// Queues a copy of `packet` on every active port except `exclude`.
    pub fn flood(&mut self, packet: Packet<T>, exclude: Option<&T::Port>) {
        for port in self.links.keys() {
            if Some(port) == exclude {
                continue;
            }
            self.outbound_packets.push(OutboundPacket {
                port: port.clone(),
                packet: packet.clone(),
            });
        }
    }
    // endregion

    // region Queries

    /// Direct cost of the link on `port`.
    pub fn link_cost(&self, port: &T::Port) -> Result<u16, RoutingError<T>> {
        self.links
            .get(port)
            .map(|neigh| neigh.link_cost)
            .ok_or(RoutingError::NoSuchLink { port: port.clone() })
    }

    /// Best known route to `destination`.
    pub fn route_to(&self, destination: &T::NodeAddress) -> Result<&Route<T>, RoutingError<T>> {
        self.routes.get(destination).ok_or(RoutingError::NoRoute {
            destination: destination.clone(),
        })
    }
    // endregion
}
