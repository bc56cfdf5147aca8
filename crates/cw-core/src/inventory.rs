use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::chain::{ChainRecord, Family, Protocol};
use crate::identity::{aliases, canonical_name};

/// A family whose save tool could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyFailure {
    pub family: Family,
    pub error: String,
}

/// Chains found in one enumeration pass, indexed by canonical name and aliases
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    records: Vec<ChainRecord>,
    failures: Vec<FamilyFailure>,
    #[serde(skip)]
    keys: HashSet<(String, String, Protocol)>,
    #[serde(skip)]
    canonical: HashMap<String, usize>,
    #[serde(skip)]
    aliases: HashMap<String, Vec<usize>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; returns false if its identity key was already present
    pub fn insert(&mut self, record: ChainRecord) -> bool {
        let name = canonical_name(&record);
        let (table, chain, protocol) = record.key();
        if !self
            .keys
            .insert((table.to_string(), chain.to_string(), protocol))
        {
            debug!(%name, "duplicate chain declaration ignored");
            return false;
        }

        let index = self.records.len();
        for alias in aliases(&record) {
            self.aliases.entry(alias).or_default().push(index);
        }
        self.canonical.entry(name).or_insert(index);
        self.records.push(record);
        true
    }

    pub fn record_failure(&mut self, family: Family, error: impl ToString) {
        self.failures.push(FamilyFailure {
            family,
            error: error.to_string(),
        });
    }

    pub fn records(&self) -> &[ChainRecord] {
        &self.records
    }

    pub fn failures(&self) -> &[FamilyFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_protocol(&self, protocol: Protocol) -> impl Iterator<Item = &ChainRecord> {
        self.records.iter().filter(move |r| r.protocol == protocol)
    }

    pub fn get(&self, canonical: &str) -> Option<&ChainRecord> {
        self.canonical.get(canonical).map(|&i| &self.records[i])
    }

    /// Records answering to `name`: the exact canonical match if there is
    /// one, otherwise every record that has `name` as an alias
    pub fn lookup(&self, name: &str) -> Vec<&ChainRecord> {
        if let Some(record) = self.get(name) {
            return vec![record];
        }

        self.aliases
            .get(name)
            .map(|indices| indices.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }
}

impl Extend<ChainRecord> for Inventory {
    fn extend<T: IntoIterator<Item = ChainRecord>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<ChainRecord> for Inventory {
    fn from_iter<T: IntoIterator<Item = ChainRecord>>(iter: T) -> Self {
        let mut inventory = Inventory::new();
        inventory.extend(iter);
        inventory
    }
}
