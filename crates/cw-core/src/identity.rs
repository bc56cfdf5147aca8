use serde::Serialize;
use tracing::debug;

use crate::chain::{ChainRecord, Family, Protocol};
use crate::error::ChainError;

pub const DELIMITER: char = ':';

/// Table used when a chain name leaves the table component empty
pub const DEFAULT_TABLE: &str = "filter";

/// Tables the save tools print, across all families
pub const KNOWN_TABLES: [&str; 7] = [
    "nat", "mangle", "filter", "raw", "rawpost", "broute", "security",
];

/// Chains created by the kernel; they always exist and cannot be created or deleted
pub const BUILTIN_CHAINS: [&str; 6] = [
    "PREROUTING",
    "POSTROUTING",
    "BROUTING",
    "INPUT",
    "FORWARD",
    "OUTPUT",
];

/// Suffix that names a chain in both the IPv4 and IPv6 families
pub const IP_SUFFIX: &str = "IP";

pub fn build(table: &str, chain: &str, family: Family) -> ChainRecord {
    ChainRecord {
        table: table.to_string(),
        chain: chain.to_string(),
        protocol: family.protocol(),
        provider: family.provider(),
    }
}

pub fn is_builtin(chain: &str) -> bool {
    BUILTIN_CHAINS.contains(&chain)
}

/// Render a table name the way it appears in canonical names
pub fn render_table(table: &str, protocol: Protocol) -> String {
    if table == DEFAULT_TABLE {
        String::new()
    } else if table == "nat" || protocol == Protocol::Ethernet {
        table.to_ascii_uppercase()
    } else {
        table.to_string()
    }
}

/// Inverse of [`render_table`]
fn restore_table(rendered: &str, protocol: Protocol) -> String {
    if rendered.is_empty() {
        DEFAULT_TABLE.to_string()
    } else if protocol == Protocol::Ethernet || rendered.eq_ignore_ascii_case("nat") {
        rendered.to_ascii_lowercase()
    } else {
        rendered.to_string()
    }
}

/// `table:chain:protocol`, e.g. `:INPUT:IPv4`, `NAT:POSTROUTING:IPv6` or
/// `BROUTE:BROUTING:ethernet`
pub fn canonical_name(record: &ChainRecord) -> String {
    format!(
        "{}{DELIMITER}{}{DELIMITER}{}",
        render_table(&record.table, record.protocol),
        record.chain,
        record.protocol
    )
}

/// Shorter names that refer to the same record during resource matching.
///
/// Always `table:chain:` and `table:chain`; IP records additionally answer to
/// `table:chain:IP`.
pub fn aliases(record: &ChainRecord) -> Vec<String> {
    let base = format!(
        "{}{DELIMITER}{}",
        render_table(&record.table, record.protocol),
        record.chain
    );
    let mut names = vec![format!("{base}{DELIMITER}"), base.clone()];
    if record.protocol.is_ip() {
        names.push(format!("{base}{DELIMITER}{IP_SUFFIX}"));
    }
    names
}

/// Decompose a canonical name back into the record it was built from.
///
/// Chain names may contain `:`, so the table is split at the first delimiter
/// and the protocol at the last one.
pub fn parse_canonical(name: &str) -> Result<ChainRecord, ChainError> {
    let (table, rest) = name
        .split_once(DELIMITER)
        .ok_or_else(|| ChainError::invalid_name(name, "expected table:chain:protocol"))?;
    let (chain, suffix) = rest
        .rsplit_once(DELIMITER)
        .ok_or_else(|| ChainError::invalid_name(name, "missing protocol component"))?;
    let protocol: Protocol = suffix
        .parse()
        .map_err(|_| ChainError::invalid_name(name, format!("unknown protocol '{suffix}'")))?;
    validate_chain(name, chain)?;

    Ok(build(
        &restore_table(table, protocol),
        chain,
        protocol.family(),
    ))
}

fn validate_chain(name: &str, chain: &str) -> Result<(), ChainError> {
    if chain.is_empty() {
        return Err(ChainError::invalid_name(name, "empty chain component"));
    }
    if chain.chars().any(char::is_whitespace) {
        return Err(ChainError::invalid_name(name, "chain contains whitespace"));
    }
    Ok(())
}

/// Which protocols a resource name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolScope {
    Exact(Protocol),
    Ip,
    Any,
}

impl ProtocolScope {
    pub fn families(self) -> Vec<Family> {
        match self {
            ProtocolScope::Exact(protocol) => vec![protocol.family()],
            ProtocolScope::Ip => vec![Family::Iptables, Family::Ip6tables],
            ProtocolScope::Any => Family::ALL.to_vec(),
        }
    }
}

/// A desired-state chain name, possibly in one of the shortened forms.
///
/// Parsed without a live record, so a trailing empty component always means
/// "any protocol". For a chain whose own name ends in `:`, only the
/// `table:chain:` and canonical forms keep the full chain here; the
/// `table:chain` alias still resolves through [`Inventory::lookup`].
///
/// [`Inventory::lookup`]: crate::inventory::Inventory::lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceName {
    pub table: String,
    pub chain: String,
    pub scope: ProtocolScope,
}

impl ResourceName {
    pub fn parse(name: &str) -> Result<Self, ChainError> {
        let (table, rest) = name
            .split_once(DELIMITER)
            .ok_or_else(|| ChainError::invalid_name(name, "expected table:chain[:protocol]"))?;

        let (chain, scope) = match rest.rsplit_once(DELIMITER) {
            Some((chain, "")) => (chain, ProtocolScope::Any),
            Some((chain, IP_SUFFIX)) => (chain, ProtocolScope::Ip),
            Some((chain, suffix)) => match suffix.parse::<Protocol>() {
                Ok(protocol) => (chain, ProtocolScope::Exact(protocol)),
                Err(_) => (rest, ProtocolScope::Any),
            },
            None => (rest, ProtocolScope::Any),
        };
        validate_chain(name, chain)?;

        if !table.is_empty() && !KNOWN_TABLES.iter().any(|t| t.eq_ignore_ascii_case(table)) {
            debug!(name = %name, table = %table, "resource names a table the save tools never print");
        }

        let table = if table.is_empty() {
            DEFAULT_TABLE.to_string()
        } else {
            table.to_ascii_lowercase()
        };

        Ok(Self {
            table,
            chain: chain.to_string(),
            scope,
        })
    }

    pub fn is_builtin(&self) -> bool {
        is_builtin(&self.chain)
    }
}
