//! Firewall rule payloads as exchanged with the cloud firewall API
//!
//! This module defines the shape of a single firewall rule and of a complete
//! rule set. The revision editor in [`crate::core::editor`] treats a rule as an
//! opaque payload; the only operation it needs from this module is
//! [`FirewallRule::merge`], which applies a partial [`RulePatch`].
//!
//! # Rule Structure
//!
//! A [`FirewallRule`] carries:
//! - Protocol (TCP, UDP, ICMP, IPENCAP)
//! - Ports as the API's free-form string (`"22"`, `"80, 443"`, `"8000-9000"`)
//! - Action (Accept/Drop)
//! - IPv4 and IPv6 address lists
//! - Optional label and description
//!
//! # Limits
//!
//! A rule set is limited to [`MAX_RULES`] rules, inbound and outbound combined.
//!
//! # Example
//!
//! ```
//! use fwedit::core::firewall::{FirewallRule, Protocol, RulePatch};
//!
//! let rule = FirewallRule::new(Protocol::Tcp).with_ports("22");
//! let patched = rule.merge(&RulePatch {
//!     ports: Some("2222".to_string()),
//!     ..RulePatch::default()
//! });
//!
//! assert_eq!(patched.ports.as_deref(), Some("2222"));
//! assert_eq!(patched.protocol, Protocol::Tcp);
//! ```

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Maximum number of rules in one rule set, inbound and outbound combined
///
/// Mirrors the API limit. Payloads that exceed it are rejected by the CLI
/// before they are printed.
pub const MAX_RULES: usize = 25;

/// Network protocol matched by a rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    /// Transmission Control Protocol
    #[strum(serialize = "TCP")]
    Tcp,
    /// User Datagram Protocol
    #[strum(serialize = "UDP")]
    Udp,
    /// Internet Control Message Protocol
    #[strum(serialize = "ICMP")]
    Icmp,
    /// IP-in-IP encapsulation
    #[strum(serialize = "IPENCAP")]
    Ipencap,
}

impl Protocol {
    /// Returns whether rules of this protocol may carry a port list
    pub const fn supports_ports(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

/// Rule action, also used for the per-direction default policy
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum RuleAction {
    /// Allow matching traffic
    #[default]
    #[strum(serialize = "ACCEPT")]
    Accept,
    /// Silently discard matching traffic
    #[strum(serialize = "DROP")]
    Drop,
}

/// Addresses a rule applies to, split by IP family
///
/// `None` and an empty list are distinct on the wire: the API treats a missing
/// family as "no addresses of this family".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RuleAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Vec<String>>,
}

impl RuleAddresses {
    /// Addresses matching every IPv4 and IPv6 host
    pub fn all() -> Self {
        Self {
            ipv4: Some(vec!["0.0.0.0/0".to_string()]),
            ipv6: Some(vec!["::/0".to_string()]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.as_ref().is_none_or(Vec::is_empty)
            && self.ipv6.as_ref().is_none_or(Vec::is_empty)
    }
}

/// Splits address strings into IPv4 and IPv6 lists.
///
/// Only the base address before any `/` decides the family; the prefix length
/// is not checked here and each entry is kept exactly as given. Entries whose
/// base is not an IP address are dropped. A family with no entries is left as
/// `None`.
pub fn classify_ips<S: AsRef<str>>(ips: &[S]) -> RuleAddresses {
    let mut addresses = RuleAddresses::default();

    for raw in ips {
        let address = raw.as_ref();
        let base = address.split('/').next().unwrap_or_default();
        let family = match base.parse::<IpNetwork>() {
            Ok(IpNetwork::V4(_)) => &mut addresses.ipv4,
            Ok(IpNetwork::V6(_)) => &mut addresses.ipv6,
            Err(_) => continue,
        };
        family
            .get_or_insert_with(Vec::new)
            .push(address.to_string());
    }

    addresses
}

/// A single firewall rule as stored by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FirewallRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default)]
    pub addresses: RuleAddresses,
}

impl FirewallRule {
    /// Creates an accepting rule for `protocol` with no ports and no addresses
    pub fn new(protocol: Protocol) -> Self {
        Self {
            label: None,
            description: None,
            protocol,
            ports: None,
            action: RuleAction::Accept,
            addresses: RuleAddresses::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_ports(mut self, ports: impl Into<String>) -> Self {
        self.ports = Some(ports.into());
        self
    }

    pub fn with_addresses(mut self, addresses: RuleAddresses) -> Self {
        self.addresses = addresses;
        self
    }

    /// Returns a copy of this rule with every field set in `patch` replaced.
    ///
    /// The merge is shallow: a patched `addresses` replaces both address
    /// families at once. Switching to a protocol without ports (ICMP, IPENCAP)
    /// drops the ports, since the API rejects them there.
    pub fn merge(&self, patch: &RulePatch) -> Self {
        let protocol = patch.protocol.unwrap_or(self.protocol);
        let ports = if protocol.supports_ports() {
            patch.ports.clone().or_else(|| self.ports.clone())
        } else {
            None
        };

        Self {
            label: patch.label.clone().or_else(|| self.label.clone()),
            description: patch
                .description
                .clone()
                .or_else(|| self.description.clone()),
            protocol,
            ports,
            action: patch.action.unwrap_or(self.action),
            addresses: patch
                .addresses
                .clone()
                .unwrap_or_else(|| self.addresses.clone()),
        }
    }
}

/// Partial rule used by modify actions
///
/// Absent fields keep the current value of the rule being modified.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<RuleAddresses>,
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Complete rule set of one firewall as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallRules {
    #[serde(default)]
    pub inbound: Vec<FirewallRule>,
    #[serde(default)]
    pub outbound: Vec<FirewallRule>,
    #[serde(default = "default_inbound_policy")]
    pub inbound_policy: RuleAction,
    #[serde(default)]
    pub outbound_policy: RuleAction,
}

fn default_inbound_policy() -> RuleAction {
    RuleAction::Drop
}

impl FirewallRules {
    pub fn new(inbound: Vec<FirewallRule>, outbound: Vec<FirewallRule>) -> Self {
        Self {
            inbound,
            outbound,
            inbound_policy: default_inbound_policy(),
            outbound_policy: RuleAction::Accept,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }
}

impl Default for FirewallRules {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}
