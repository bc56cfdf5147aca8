use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ChainError;

/// Tool family that reads and writes one kind of netfilter table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Iptables,
    Ip6tables,
    Ebtables,
}

impl Family {
    /// Enumeration order
    pub const ALL: [Family; 3] = [Family::Iptables, Family::Ip6tables, Family::Ebtables];

    pub fn protocol(self) -> Protocol {
        match self {
            Family::Iptables => Protocol::IPv4,
            Family::Ip6tables => Protocol::IPv6,
            Family::Ebtables => Protocol::Ethernet,
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            Family::Iptables => Provider::IptablesChain,
            Family::Ip6tables => Provider::Ip6tablesChain,
            Family::Ebtables => Provider::EbtablesChain,
        }
    }

    /// Binary used to manage chains at runtime
    pub fn runtime_tool(self) -> &'static str {
        match self {
            Family::Iptables => "iptables",
            Family::Ip6tables => "ip6tables",
            Family::Ebtables => "ebtables",
        }
    }

    /// Binary that dumps the current state as text
    pub fn save_tool(self) -> &'static str {
        match self {
            Family::Iptables => "iptables-save",
            Family::Ip6tables => "ip6tables-save",
            Family::Ebtables => "ebtables-save",
        }
    }

    pub fn tools(self) -> [&'static str; 2] {
        [self.runtime_tool(), self.save_tool()]
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.runtime_tool())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Protocol {
    IPv4,
    IPv6,
    #[serde(rename = "ethernet")]
    Ethernet,
}

impl Protocol {
    pub fn family(self) -> Family {
        match self {
            Protocol::IPv4 => Family::Iptables,
            Protocol::IPv6 => Family::Ip6tables,
            Protocol::Ethernet => Family::Ebtables,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::IPv4 => "IPv4",
            Protocol::IPv6 => "IPv6",
            Protocol::Ethernet => "ethernet",
        }
    }

    pub fn is_ip(self) -> bool {
        matches!(self, Protocol::IPv4 | Protocol::IPv6)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IPv4" => Ok(Protocol::IPv4),
            "IPv6" => Ok(Protocol::IPv6),
            "ethernet" => Ok(Protocol::Ethernet),
            other => Err(ChainError::UnknownProtocol(other.to_string())),
        }
    }
}

/// Backend that governs a chain resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    IptablesChain,
    Ip6tablesChain,
    EbtablesChain,
}

impl Provider {
    pub fn family(self) -> Family {
        match self {
            Provider::IptablesChain => Family::Iptables,
            Provider::Ip6tablesChain => Family::Ip6tables,
            Provider::EbtablesChain => Family::Ebtables,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::IptablesChain => "iptables_chain",
            Provider::Ip6tablesChain => "ip6tables_chain",
            Provider::EbtablesChain => "ebtables_chain",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chain discovered in the live ruleset.
///
/// `table` is the table name as printed by the save tool, so default-table
/// chains carry `filter` here and only the canonical name renders it empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainRecord {
    pub table: String,
    pub chain: String,
    pub protocol: Protocol,
    pub provider: Provider,
}

impl ChainRecord {
    pub fn key(&self) -> (&str, &str, Protocol) {
        (&self.table, &self.chain, self.protocol)
    }
}

impl fmt::Display for ChainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::identity::canonical_name(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_mappings_are_consistent() {
        for family in Family::ALL {
            assert_eq!(family.protocol().family(), family);
            assert_eq!(family.provider().family(), family);
        }
    }

    #[test]
    fn protocol_parses_exact_tokens_only() {
        assert_eq!("IPv4".parse::<Protocol>().unwrap(), Protocol::IPv4);
        assert_eq!("ethernet".parse::<Protocol>().unwrap(), Protocol::Ethernet);
        assert!("ipv4".parse::<Protocol>().is_err());
        assert!("IP".parse::<Protocol>().is_err());
    }

    #[test]
    fn serializes_with_external_names() {
        let record = ChainRecord {
            table: "broute".into(),
            chain: "BROUTING".into(),
            protocol: Protocol::Ethernet,
            provider: Provider::EbtablesChain,
        };
        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("protocol: ethernet"));
        assert!(yaml.contains("provider: ebtables_chain"));
    }
}
