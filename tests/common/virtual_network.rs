use serde::{Deserialize, Serialize};

use dvroute::concepts::packet::{DataPacket, Packet};
use dvroute::framework::RoutingSystem;
use dvroute::router::Router;

/// An in-memory network of routers with per-tick delivery: packets queued
/// during one tick reach the far end of their link on the next.
#[derive(Serialize, Deserialize)]
pub struct VirtualSystem {
    pub routers: Vec<Router<VirtualSystem>>,
    /// live edges as (port id shared by both endpoints, node a, node b)
    pub edges: Vec<(u32, String, String)>,
    /// (node, arrival port, packet) waiting for the next tick
    pub in_flight: Vec<(String, u32, Packet<VirtualSystem>)>,
    /// packets that left the network toward an attached host, as
    /// (sending node, host port, packet)
    pub host_egress: Vec<(String, u32, Packet<VirtualSystem>)>,
    pub now: u64,
}

impl RoutingSystem for VirtualSystem {
    type NodeAddress = String;
    type Port = u32;
    type TimeSource = dvroute::framework::ManualTime;
}

impl VirtualSystem {
    pub fn create(nodes: &[&str], links: &[(u32, &str, &str, u16)]) -> VirtualSystem {
        let mut routers: Vec<Router<VirtualSystem>> =
            nodes.iter().map(|id| Router::new(id.to_string())).collect();
        let mut edges = Vec::new();
        for (eid, a, b, cost) in links {
            for router in routers.iter_mut() {
                if router.address == *a || router.address == *b {
                    router.handle_link_up(*eid, *cost);
                }
            }
            edges.push((*eid, a.to_string(), b.to_string()));
        }
        for router in routers.iter_mut() {
            router.outbound_packets.clear(); // nothing to say yet
        }
        VirtualSystem {
            routers,
            edges,
            in_flight: Vec::new(),
            host_egress: Vec::new(),
            now: 0,
        }
    }

    pub fn get_node(&mut self, node: &str) -> &mut Router<VirtualSystem> {
        self.routers
            .iter_mut()
            .find(|r| r.address == node)
            .unwrap_or_else(|| panic!("no node {node}"))
    }

    /// Wires a host onto `node` at `port` and delivers its announcement.
    pub fn attach_host(&mut self, node: &str, port: u32, cost: u16, host: &str) {
        let host = host.to_string();
        let router = self.get_node(node);
        router.handle_link_up(port, cost);
        router.handle_packet(&Packet::HostAnnounce { host }, &port);
    }

    /// Injects a data packet as if a host pushed it into `node` on `port`.
    pub fn send_data(&mut self, node: &str, port: u32, from: &str, to: &str, payload: &[u8]) {
        let packet = Packet::Data(DataPacket {
            source: from.to_string(),
            destination: to.to_string(),
            payload: payload.to_vec(),
        });
        self.get_node(node).handle_packet(&packet, &port);
    }

    pub fn set_cost(&mut self, edge: u32, cost: u16) {
        let (_, a, b) = self
            .edges
            .iter()
            .find(|(e, _, _)| *e == edge)
            .cloned()
            .unwrap_or_else(|| panic!("no edge {edge}"));
        self.get_node(&a).handle_link_up(edge, cost);
        self.get_node(&b).handle_link_up(edge, cost);
    }

    /// Tears an edge down, dropping anything still in flight on it.
    pub fn cut_link(&mut self, edge: u32) {
        let Some(pos) = self.edges.iter().position(|(e, _, _)| *e == edge) else {
            return;
        };
        let (_, a, b) = self.edges.remove(pos);
        self.in_flight.retain(|(_, port, _)| *port != edge);
        self.get_node(&a).handle_link_down(&edge);
        self.get_node(&b).handle_link_down(&edge);
    }

    pub fn get_metric_to(&self, node: &str, dest: &str) -> u16 {
        let router = self
            .routers
            .iter()
            .find(|r| r.address == node)
            .unwrap_or_else(|| panic!("no node {node}"));
        router
            .routes
            .get(dest)
            .unwrap_or_else(|| panic!("no route to {dest}"))
            .metric
    }

    pub fn get_next_hop(&self, node: &str, dest: &str) -> u32 {
        let router = self
            .routers
            .iter()
            .find(|r| r.address == node)
            .unwrap_or_else(|| panic!("no node {node}"));
        router
            .routes
            .get(dest)
            .unwrap_or_else(|| panic!("no route to {dest}"))
            .next_hop
    }

    pub fn has_route(&self, node: &str, dest: &str) -> bool {
        self.routers
            .iter()
            .find(|r| r.address == node)
            .map(|r| r.routes.contains_key(dest))
            .unwrap_or(false)
    }

    /// Moves queued outbound packets onto the wire (or out to a host).
    pub fn flush_packets(&mut self) {
        let mut queued = Vec::new();
        for router in &mut self.routers {
            let from = router.address.clone();
            for out in router.outbound_packets.drain(..) {
                queued.push((from.clone(), out.port, out.packet));
            }
        }
        for (from, port, packet) in queued {
            match self.edges.iter().find(|(e, _, _)| *e == port).cloned() {
                Some((_, a, b)) => {
                    let other = if a == from { b } else { a };
                    self.in_flight.push((other, port, packet));
                }
                None => self.host_egress.push((from, port, packet)),
            }
        }
    }

    /// One simulation step: advance the clocks, deliver last tick's packets,
    /// run every node's timer, then collect what they queued.
    pub fn tick(&mut self) {
        self.now += 1;
        for router in &mut self.routers {
            router.clock.set(self.now);
        }
        let batch = std::mem::take(&mut self.in_flight);
        for (node, port, packet) in batch {
            self.get_node(&node).handle_packet(&packet, &port);
        }
        for router in &mut self.routers {
            router.handle_timer();
        }
        self.flush_packets();
    }

    pub fn tick_n(&mut self, times: u32) {
        for _ in 0..times {
            self.tick();
        }
    }

    pub fn freeze(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    pub fn restore(state: &str) -> VirtualSystem {
        serde_json::from_str(state).unwrap()
    }
}
