use crate::common::virtual_network::VirtualSystem;

/// Five routers in a weighted mesh, with a host hanging off each one.
pub fn vnet_weighted() -> VirtualSystem {
    let mut net = VirtualSystem::create(
        &["1", "2", "3", "4", "5"],
        &[
            (0, "1", "2", 2),
            (1, "1", "3", 1),
            (2, "2", "3", 4),
            (3, "2", "4", 5),
            (4, "3", "4", 100),
            (5, "3", "5", 8),
            (6, "4", "5", 1),
        ],
    );
    for (i, node) in ["1", "2", "3", "4", "5"].iter().enumerate() {
        net.attach_host(node, 100 + i as u32, 0, &format!("h{node}"));
    }
    net
}

/// Three routers in a line, host h3 attached at the far end.
pub fn vnet_chain() -> VirtualSystem {
    let mut net = VirtualSystem::create(&["1", "2", "3"], &[(0, "1", "2", 1), (1, "2", "3", 1)]);
    net.attach_host("3", 100, 0, "h3");
    net
}

/// Two routers joined by a single link, host h announced behind "2".
pub fn vnet_pair() -> VirtualSystem {
    let mut net = VirtualSystem::create(&["1", "2"], &[(0, "1", "2", 3)]);
    net.attach_host("2", 100, 0, "h");
    net
}
