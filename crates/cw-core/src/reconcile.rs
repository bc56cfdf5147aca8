use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::chain::{ChainRecord, Provider};
use crate::inventory::Inventory;
use crate::provider::ProviderSelector;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ensure::Present => write!(f, "present"),
            Ensure::Absent => write!(f, "absent"),
        }
    }
}

/// A chain as declared in desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredChain {
    pub name: String,
    #[serde(default)]
    pub ensure: Ensure,
}

impl DesiredChain {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Present,
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Absent,
        }
    }
}

/// How a desired chain compares to the live inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    pub name: String,
    pub ensure: Ensure,
    pub provider: Option<Provider>,
    pub error: Option<String>,
    pub matches: Vec<ChainRecord>,
    pub in_sync: bool,
}

impl ChainStatus {
    pub fn is_ok(&self) -> bool {
        self.in_sync && self.error.is_none()
    }
}

/// Match each desired chain against the inventory without changing anything.
///
/// Provider errors are recorded on the affected status only.
pub fn reconcile(
    desired: &[DesiredChain],
    inventory: &Inventory,
    selector: &ProviderSelector,
) -> Vec<ChainStatus> {
    desired
        .iter()
        .map(|wanted| {
            let matches: Vec<ChainRecord> =
                inventory.lookup(&wanted.name).into_iter().cloned().collect();

            let (provider, error) = match selector.materialize(&wanted.name) {
                Ok(resource) => (Some(resource.provider), None),
                Err(e) => {
                    warn!(name = %wanted.name, error = %e, "cannot materialize chain resource");
                    (None, Some(e.to_string()))
                }
            };

            let in_sync = match wanted.ensure {
                Ensure::Present => !matches.is_empty(),
                Ensure::Absent => matches.is_empty(),
            };

            ChainStatus {
                name: wanted.name.clone(),
                ensure: wanted.ensure,
                provider,
                error,
                matches,
                in_sync,
            }
        })
        .collect()
}
