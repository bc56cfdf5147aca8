use cw_core::Protocol;
use serde::Serialize;
use tracing::trace;

/// A chain declaration found in save output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveEntry {
    pub table: String,
    pub chain: String,
}

impl SaveEntry {
    pub fn new(table: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            chain: chain.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseState {
    OutsideTable,
    InTable(String),
}

/// Line-at-a-time reader for `iptables-save`, `ip6tables-save` and
/// `ebtables-save` output.
///
/// Only `*table` headers and `:chain policy [packets:bytes]` declarations
/// are extracted; comments, `COMMIT` and rule lines are skipped. Feed lines
/// in order, then call [`SaveParser::finish`].
#[derive(Debug)]
pub struct SaveParser {
    protocol: Protocol,
    state: ParseState,
    entries: Vec<SaveEntry>,
}

impl SaveParser {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            state: ParseState::OutsideTable,
            entries: Vec::new(),
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line == "COMMIT" {
            return;
        }

        if let Some(table) = line.strip_prefix('*') {
            let table = table.trim();
            self.state = if table.is_empty() {
                trace!(protocol = %self.protocol, line = %line, "table header without a name");
                ParseState::OutsideTable
            } else {
                ParseState::InTable(table.to_string())
            };
            return;
        }

        let Some(declaration) = line.strip_prefix(':') else {
            return;
        };

        match (&self.state, chain_name(declaration)) {
            (ParseState::InTable(table), Some(chain)) => {
                self.entries.push(SaveEntry::new(table.as_str(), chain));
            }
            (ParseState::OutsideTable, _) => {
                trace!(protocol = %self.protocol, line = %line, "chain declared outside a table");
            }
            (ParseState::InTable(_), None) => {
                trace!(protocol = %self.protocol, line = %line, "chain declaration without a name");
            }
        }
    }

    pub fn finish(self) -> Vec<SaveEntry> {
        self.entries
    }
}

/// Everything up to the first whitespace; chain names never contain any
fn chain_name(declaration: &str) -> Option<&str> {
    declaration
        .split(char::is_whitespace)
        .next()
        .filter(|name| !name.is_empty())
}

/// Parse a whole dump, preserving declaration order
pub fn parse(raw: &str, protocol: Protocol) -> Vec<SaveEntry> {
    let mut parser = SaveParser::new(protocol);
    for line in raw.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const IPTABLES_SAVE: &str = r#"
# Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
*raw
:PREROUTING ACCEPT [12:1780]
:OUTPUT ACCEPT [19:1159]
:raw - [0:0]
COMMIT
# Completed on Mon Jan  2 01:20:06 2012
*filter
:INPUT ACCEPT [0:0]
:FORWARD DROP [0:0]
:OUTPUT ACCEPT [5673:420879]
:$5()*&%'"^$):  - [0:0]
-A INPUT -s 10.0.0.0/8 -j ACCEPT
COMMIT
"#;

    fn entries(pairs: &[(&str, &str)]) -> Vec<SaveEntry> {
        pairs.iter().map(|(t, c)| SaveEntry::new(*t, *c)).collect()
    }

    #[test]
    fn extracts_tables_and_chains_in_order() {
        assert_eq!(
            parse(IPTABLES_SAVE, Protocol::IPv4),
            entries(&[
                ("raw", "PREROUTING"),
                ("raw", "OUTPUT"),
                ("raw", "raw"),
                ("filter", "INPUT"),
                ("filter", "FORWARD"),
                ("filter", "OUTPUT"),
                ("filter", "$5()*&%'\"^$):"),
            ])
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let first = parse(IPTABLES_SAVE, Protocol::IPv4);
        for _ in 0..3 {
            assert_eq!(parse(IPTABLES_SAVE, Protocol::IPv4), first);
        }
    }

    #[test]
    fn tolerates_indentation_and_ebtables_policies() {
        let raw = "\n  *broute\n  :BROUTING ACCEPT\n  :broute ACCEPT\n\n  *filter\n  :filterreturn RETURN\n  ";
        assert_eq!(
            parse(raw, Protocol::Ethernet),
            entries(&[
                ("broute", "BROUTING"),
                ("broute", "broute"),
                ("filter", "filterreturn"),
            ])
        );
    }

    #[test]
    fn empty_and_comment_only_input() {
        assert!(parse("", Protocol::IPv6).is_empty());
        assert!(parse("# nothing\n# here\nCOMMIT\n", Protocol::IPv6).is_empty());
    }

    #[test]
    fn skips_malformed_declarations() {
        let raw = ":ORPHAN ACCEPT [0:0]\n*\n:STILL_ORPHAN -\n*mangle\n:\n:  - [0:0]\n:ok -\n";
        assert_eq!(parse(raw, Protocol::IPv4), entries(&[("mangle", "ok")]));
    }

    #[test]
    fn commit_does_not_leave_the_table() {
        let raw = "*nat\nCOMMIT\n:late ACCEPT\n";
        assert_eq!(parse(raw, Protocol::IPv4), entries(&[("nat", "late")]));
    }

    #[test]
    fn chain_names_keep_punctuation() {
        let raw = "*filter\n:a:b:c - [0:0]\n:\"quoted\" -\n:(x)&;|$ DROP\n";
        assert_eq!(
            parse(raw, Protocol::IPv4),
            entries(&[
                ("filter", "a:b:c"),
                ("filter", "\"quoted\""),
                ("filter", "(x)&;|$"),
            ])
        );
    }

    #[test]
    fn fed_lines_accumulate_until_finish() {
        let mut parser = SaveParser::new(Protocol::IPv4);
        parser.feed_line("*security");
        parser.feed_line(":SECMARK - [0:0]");
        parser.feed_line("*");
        parser.feed_line(":dropped - [0:0]");
        assert_eq!(parser.finish(), entries(&[("security", "SECMARK")]));
    }
}
