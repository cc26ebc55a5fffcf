//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::core::firewall::{FirewallRule, FirewallRules, Protocol, RuleAddresses};

/// Creates an accepting rule for all addresses.
///
/// # Arguments
///
/// * `protocol` - Protocol type
/// * `ports` - Port list as the API writes it; empty for no ports
pub fn rule(protocol: Protocol, ports: &str) -> FirewallRule {
    let rule = FirewallRule::new(protocol).with_addresses(RuleAddresses::all());
    if ports.is_empty() {
        rule
    } else {
        rule.with_ports(ports)
    }
}

/// Creates the canonical two-inbound, zero-outbound rule set.
///
/// Inbound holds SSH (`TCP 22`) and HTTP/HTTPS (`TCP 80, 443`), in that order.
pub fn sample_rules() -> FirewallRules {
    FirewallRules::new(
        vec![
            rule(Protocol::Tcp, "22").with_label("ssh"),
            rule(Protocol::Tcp, "80, 443").with_label("web"),
        ],
        vec![],
    )
}
