//! Rendering of connectivity directives and host bridge steps.

use super::types::{BridgeStep, ConnectivityDirective, DirectiveKind};
use crate::topology::Topology;

/// One directive per link (named `link<N>`, document order) followed by one
/// per hub (named after the hub, sorted by name)
pub fn build_connectivity_directives(topology: &Topology) -> Vec<ConnectivityDirective> {
    let links = topology.links.iter().enumerate().map(|(i, link)| ConnectivityDirective {
        name: format!("link{}", i),
        kind: DirectiveKind::Link,
        endpoints: link.endpoints().iter().map(|ep| ep.to_string()).collect(),
    });

    let hubs = topology.hubs.iter().map(|(name, hub)| ConnectivityDirective {
        name: name.clone(),
        kind: DirectiveKind::Hub,
        endpoints: hub.endpoints.iter().map(|ep| ep.to_string()).collect(),
    });

    links.chain(hubs).collect()
}

/// One bridge step per custom attachment, sorted by attachment name
pub fn build_bridge_steps(topology: &Topology) -> Vec<BridgeStep> {
    topology
        .custom
        .iter()
        .map(|(name, custom)| BridgeStep {
            name: name.clone(),
            linux_bridge: custom.linux_bridge.clone(),
            ports: custom.ports.iter().map(|ep| ep.to_string()).collect(),
        })
        .collect()
}

/// Quote a value for a POSIX shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Text safe inside a `#` comment: control characters are escaped so the
/// comment cannot end early
fn comment_text(value: &str) -> String {
    let mut text = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_control() {
            text.extend(c.escape_default());
        } else {
            text.push(c);
        }
    }
    text
}

/// Render the host bridge creation script
///
/// Each step is a single `create_bridge` call; the helper is a no-op for
/// bridges that already exist, so the script can be re-run.
pub fn render_bridge_script(topology_name: &str, steps: &[BridgeStep]) -> String {
    let mut script = format!(
        r#"#!/bin/sh
# Host bridges for topology {}
set -e

create_bridge() {{
    ip link show "$1" >/dev/null 2>&1 || ip link add name "$1" type bridge
    ip link set "$1" up
}}

"#,
        comment_text(topology_name)
    );

    for step in steps {
        script.push_str(&format!(
            "create_bridge {} # custom {}: {}\n",
            shell_quote(&step.linux_bridge),
            comment_text(&step.name),
            comment_text(&step.ports.join(" "))
        ));
    }

    script
}
