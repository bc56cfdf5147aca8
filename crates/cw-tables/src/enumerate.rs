use cw_core::identity::build;
use cw_core::{ChainRecord, Family, Inventory, ToolAvailability};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::executor::{CommandExecutor, ExecError};
use crate::save;

/// Turn one family's save output into chain records
pub fn records_from_save(raw: &str, family: Family) -> Vec<ChainRecord> {
    save::parse(raw, family.protocol())
        .into_iter()
        .map(|entry| build(&entry.table, &entry.chain, family))
        .collect()
}

/// Reads the live chain inventory through the save tools
pub struct ChainEnumerator<'a, E: CommandExecutor + ?Sized> {
    tools: &'a ToolAvailability,
    executor: &'a E,
}

impl<'a, E: CommandExecutor + ?Sized> ChainEnumerator<'a, E> {
    pub fn new(tools: &'a ToolAvailability, executor: &'a E) -> Self {
        Self { tools, executor }
    }

    /// One pass over every available family; a failing family is recorded
    /// in the inventory and the others still run
    pub fn enumerate(&self) -> Inventory {
        let mut inventory = Inventory::new();

        for family in Family::ALL {
            let save_tool = match self.tools.save_tool(family) {
                Some(path) if self.tools.family_available(family) => path,
                _ => {
                    debug!(
                        %family,
                        missing = ?self.tools.missing(family),
                        "skipping family without tools"
                    );
                    continue;
                }
            };

            match self.enumerate_family(family, save_tool) {
                Ok(records) => {
                    debug!(%family, chains = records.len(), "enumerated family");
                    inventory.extend(records);
                }
                Err(e) => {
                    warn!(%family, error = %e, "failed to read chains");
                    inventory.record_failure(family, e);
                }
            }
        }

        info!(
            chains = inventory.len(),
            failures = inventory.failures().len(),
            "chain enumeration complete"
        );
        inventory
    }

    pub fn enumerate_family(
        &self,
        family: Family,
        save_tool: &Path,
    ) -> Result<Vec<ChainRecord>, ExecError> {
        let output = self.executor.execute(&[save_tool.as_os_str()])?;
        Ok(records_from_save(&output, family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::identity::canonical_name;
    use cw_core::{Protocol, Provider};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::ffi::{OsStr, OsString};
    use std::path::PathBuf;

    const EBTABLES_SAVE: &str = "
  *broute
  :BROUTING ACCEPT
  :broute ACCEPT

  *filter
  :INPUT ACCEPT
  :FORWARD ACCEPT
  :OUTPUT ACCEPT
  :filter ACCEPT
  :filterdrop DROP
  :filterreturn RETURN
  ";

    const EBTABLES_SAVE_WITH_NAT: &str = "
  *broute
  :BROUTING ACCEPT
  :broute ACCEPT

  *nat
  :PREROUTING ACCEPT
  :OUTPUT ACCEPT
  :POSTROUTING ACCEPT

  *filter
  :INPUT ACCEPT
  :FORWARD ACCEPT
  :OUTPUT ACCEPT
  :filter ACCEPT
  :filterdrop DROP
  :filterreturn RETURN
  ";

    const IPTABLES_SAVE: &str = r#"
  # Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
  *raw
  :PREROUTING ACCEPT [12:1780]
  :OUTPUT ACCEPT [19:1159]
  :raw - [0:0]
  COMMIT
  # Completed on Mon Jan  2 01:20:06 2012
  # Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
  *mangle
  :PREROUTING ACCEPT [12:1780]
  :INPUT ACCEPT [12:1780]
  :FORWARD ACCEPT [0:0]
  :OUTPUT ACCEPT [19:1159]
  :POSTROUTING ACCEPT [19:1159]
  :mangle - [0:0]
  COMMIT
  # Completed on Mon Jan  2 01:20:06 2012
  # Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
  *nat
  :PREROUTING ACCEPT [2242:639750]
  :OUTPUT ACCEPT [5176:326206]
  :POSTROUTING ACCEPT [5162:325382]
  COMMIT
  # Completed on Mon Jan  2 01:20:06 2012
  # Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
  *filter
  :INPUT ACCEPT [0:0]
  :FORWARD DROP [0:0]
  :OUTPUT ACCEPT [5673:420879]
  :$5()*&%'"^$):  - [0:0]
  COMMIT
  # Completed on Mon Jan  2 01:20:06 2012
  "#;

    const IP6TABLES_SAVE: &str = "
  # Generated by ip6tables-save v1.4.9 on Mon Jan  2 01:31:39 2012
  *raw
  :PREROUTING ACCEPT [2173:489241]
  :OUTPUT ACCEPT [0:0]
  :ff - [0:0]
  COMMIT
  *filter
  :INPUT ACCEPT [0:0]
  :FORWARD DROP [0:0]
  :OUTPUT ACCEPT [20:1292]
  :test - [0:0]
  COMMIT
  ";

    /// Answers with canned output per program and records every call
    #[derive(Default)]
    struct FixtureExecutor {
        outputs: HashMap<OsString, Option<String>>,
        calls: RefCell<Vec<Vec<OsString>>>,
    }

    impl FixtureExecutor {
        fn with(mut self, program: &str, output: &str) -> Self {
            self.outputs.insert(program.into(), Some(output.to_string()));
            self
        }

        fn failing(mut self, program: &str) -> Self {
            self.outputs.insert(program.into(), None);
            self
        }
    }

    impl CommandExecutor for FixtureExecutor {
        fn execute(&self, argv: &[&OsStr]) -> Result<String, ExecError> {
            self.calls
                .borrow_mut()
                .push(argv.iter().map(|a| a.to_os_string()).collect());

            let program = argv[0].to_string_lossy().into_owned();
            match self.outputs.get(argv[0]) {
                Some(Some(output)) => Ok(output.clone()),
                Some(None) => Err(ExecError::Status {
                    program,
                    status: "exit status: 1".into(),
                    stderr: "can't initialize iptables table".into(),
                }),
                None => Err(ExecError::Spawn {
                    program,
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    fn sbin_tools(missing: &[&str]) -> ToolAvailability {
        ToolAvailability::probe(|name| {
            (!missing.contains(&name)).then(|| PathBuf::from("/sbin").join(name))
        })
    }

    fn all_fixtures() -> FixtureExecutor {
        FixtureExecutor::default()
            .with("/sbin/iptables-save", IPTABLES_SAVE)
            .with("/sbin/ip6tables-save", IP6TABLES_SAVE)
            .with("/sbin/ebtables-save", EBTABLES_SAVE)
    }

    fn names(records: impl IntoIterator<Item = ChainRecord>) -> Vec<String> {
        records.into_iter().map(|r| canonical_name(&r)).collect()
    }

    #[test]
    fn ebtables_dump_yields_ethernet_records() {
        let records = records_from_save(EBTABLES_SAVE, Family::Ebtables);

        assert_eq!(
            names(records.clone()),
            vec![
                "BROUTE:BROUTING:ethernet",
                "BROUTE:broute:ethernet",
                ":INPUT:ethernet",
                ":FORWARD:ethernet",
                ":OUTPUT:ethernet",
                ":filter:ethernet",
                ":filterdrop:ethernet",
                ":filterreturn:ethernet",
            ]
        );
        assert!(records.iter().all(|r| r.protocol == Protocol::Ethernet
            && r.provider == Provider::EbtablesChain));
    }

    #[test]
    fn ebtables_nat_table_renders_upper_case() {
        let records = records_from_save(EBTABLES_SAVE_WITH_NAT, Family::Ebtables);
        assert_eq!(records.len(), 11);

        let nat: Vec<String> = names(records.into_iter().filter(|r| r.table == "nat"));
        assert_eq!(
            nat,
            vec![
                "NAT:PREROUTING:ethernet",
                "NAT:OUTPUT:ethernet",
                "NAT:POSTROUTING:ethernet",
            ]
        );
    }

    #[test]
    fn enumerates_every_available_family() {
        let tools = sbin_tools(&[]);
        let executor = all_fixtures();
        let inventory = ChainEnumerator::new(&tools, &executor).enumerate();

        assert!(inventory.failures().is_empty());
        assert_eq!(inventory.by_protocol(Protocol::IPv4).count(), 16);
        assert_eq!(inventory.by_protocol(Protocol::IPv6).count(), 7);
        assert_eq!(inventory.by_protocol(Protocol::Ethernet).count(), 8);
        assert_eq!(
            *executor.calls.borrow(),
            vec![
                vec![OsString::from("/sbin/iptables-save")],
                vec![OsString::from("/sbin/ip6tables-save")],
                vec![OsString::from("/sbin/ebtables-save")],
            ]
        );
    }

    #[test]
    fn punctuated_chain_is_a_single_record() {
        let tools = sbin_tools(&[]);
        let executor = all_fixtures();
        let inventory = ChainEnumerator::new(&tools, &executor).enumerate();

        let filter: Vec<&ChainRecord> = inventory
            .by_protocol(Protocol::IPv4)
            .filter(|r| r.table == "filter")
            .collect();
        assert_eq!(filter.len(), 4);

        let odd = inventory.lookup(":$5()*&%'\"^$)::IPv4");
        assert_eq!(odd.len(), 1);
        assert_eq!(odd[0].chain, "$5()*&%'\"^$):");
        assert_eq!(odd[0].table, "filter");
    }

    #[test]
    fn every_record_round_trips_and_answers_to_aliases() {
        let tools = sbin_tools(&[]);
        let executor = all_fixtures();
        let inventory = ChainEnumerator::new(&tools, &executor).enumerate();

        for record in inventory.records() {
            let name = canonical_name(record);
            assert_eq!(&cw_core::identity::parse_canonical(&name).unwrap(), record);
            for alias in cw_core::identity::aliases(record) {
                assert!(
                    inventory.lookup(&alias).contains(&record),
                    "{alias} does not resolve to {name}"
                );
            }
        }
    }

    #[test]
    fn missing_ebtables_is_not_an_error() {
        let tools = sbin_tools(&["ebtables", "ebtables-save"]);
        let executor = all_fixtures();
        let inventory = ChainEnumerator::new(&tools, &executor).enumerate();

        assert!(inventory.failures().is_empty());
        assert_eq!(inventory.by_protocol(Protocol::Ethernet).count(), 0);
        assert_eq!(inventory.len(), 23);
        assert_eq!(executor.calls.borrow().len(), 2);
    }

    #[test]
    fn runtime_tool_is_required_too() {
        let tools = sbin_tools(&["ip6tables"]);
        let executor = all_fixtures();
        let inventory = ChainEnumerator::new(&tools, &executor).enumerate();

        assert_eq!(inventory.by_protocol(Protocol::IPv6).count(), 0);
        assert_eq!(executor.calls.borrow().len(), 2);
    }

    #[test]
    fn failing_family_does_not_hide_others() {
        let tools = sbin_tools(&[]);
        let executor = FixtureExecutor::default()
            .failing("/sbin/iptables-save")
            .with("/sbin/ip6tables-save", IP6TABLES_SAVE)
            .with("/sbin/ebtables-save", EBTABLES_SAVE);
        let inventory = ChainEnumerator::new(&tools, &executor).enumerate();

        assert_eq!(inventory.failures().len(), 1);
        assert_eq!(inventory.failures()[0].family, Family::Iptables);
        assert!(inventory.failures()[0].error.contains("can't initialize"));
        assert_eq!(inventory.by_protocol(Protocol::IPv4).count(), 0);
        assert_eq!(inventory.by_protocol(Protocol::IPv6).count(), 7);
        assert_eq!(inventory.by_protocol(Protocol::Ethernet).count(), 8);
    }

    #[test]
    fn empty_output_yields_no_records() {
        let tools = sbin_tools(&[]);
        let executor = FixtureExecutor::default()
            .with("/sbin/iptables-save", "")
            .with("/sbin/ip6tables-save", "")
            .with("/sbin/ebtables-save", "");
        let inventory = ChainEnumerator::new(&tools, &executor).enumerate();

        assert!(inventory.is_empty());
        assert!(inventory.failures().is_empty());
    }
}
