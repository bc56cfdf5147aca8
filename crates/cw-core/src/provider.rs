use serde::Serialize;
use std::cell::OnceCell;
use tracing::debug;

use crate::chain::{Family, Provider};
use crate::error::ChainError;
use crate::facts::{HostFacts, LINUX};
use crate::identity::{ProtocolScope, ResourceName};
use crate::tools::ToolAvailability;

/// A provider together with the conditions it is confined to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub provider: Provider,
    pub kernel: &'static str,
}

/// Providers in the order they are tried
pub const CANDIDATES: [Candidate; 3] = [
    Candidate {
        provider: Provider::IptablesChain,
        kernel: LINUX,
    },
    Candidate {
        provider: Provider::Ip6tablesChain,
        kernel: LINUX,
    },
    Candidate {
        provider: Provider::EbtablesChain,
        kernel: LINUX,
    },
];

impl Candidate {
    /// `Err` carries the reason the provider does not apply to this host
    pub fn confine(&self, facts: &HostFacts, tools: &ToolAvailability) -> Result<(), String> {
        if facts.kernel != self.kernel {
            return Err(format!(
                "{} requires kernel {} (host is {})",
                self.provider, self.kernel, facts.kernel
            ));
        }

        let missing = tools.missing(self.provider.family());
        if !missing.is_empty() {
            return Err(format!("{} is missing {}", self.provider, missing.join(", ")));
        }

        Ok(())
    }
}

/// Outcome of trying the candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub provider: Option<Provider>,
    pub rejected: Vec<String>,
}

/// First confined candidate whose family is in `families`
pub fn select(facts: &HostFacts, tools: &ToolAvailability, families: &[Family]) -> Selection {
    let mut rejected = Vec::new();

    for candidate in CANDIDATES
        .iter()
        .filter(|c| families.contains(&c.provider.family()))
    {
        match candidate.confine(facts, tools) {
            Ok(()) => {
                debug!(provider = %candidate.provider, "provider confined");
                return Selection {
                    provider: Some(candidate.provider),
                    rejected,
                };
            }
            Err(reason) => {
                debug!(provider = %candidate.provider, %reason, "provider rejected");
                rejected.push(reason);
            }
        }
    }

    Selection {
        provider: None,
        rejected,
    }
}

/// A chain resource bound to the provider that governs it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainResource {
    pub name: String,
    pub resource: ResourceName,
    pub provider: Provider,
}

/// Picks providers for one reconciliation run.
///
/// The default provider is computed on first use and kept until [`reset`]
/// or [`update`] is called.
///
/// [`reset`]: ProviderSelector::reset
/// [`update`]: ProviderSelector::update
#[derive(Debug)]
pub struct ProviderSelector {
    facts: HostFacts,
    tools: ToolAvailability,
    default: OnceCell<Selection>,
}

impl ProviderSelector {
    pub fn new(facts: HostFacts, tools: ToolAvailability) -> Self {
        Self {
            facts,
            tools,
            default: OnceCell::new(),
        }
    }

    pub fn facts(&self) -> &HostFacts {
        &self.facts
    }

    pub fn tools(&self) -> &ToolAvailability {
        &self.tools
    }

    /// Forget the memoized default
    pub fn reset(&mut self) {
        self.default.take();
    }

    /// Replace facts and tools and forget the memoized default
    pub fn update(&mut self, facts: HostFacts, tools: ToolAvailability) {
        self.facts = facts;
        self.tools = tools;
        self.reset();
    }

    pub fn default_selection(&self) -> &Selection {
        self.default
            .get_or_init(|| select(&self.facts, &self.tools, &Family::ALL))
    }

    pub fn default_provider(&self) -> Option<Provider> {
        self.default_selection().provider
    }

    /// Bind a resource name to its governing provider
    pub fn materialize(&self, name: &str) -> Result<ChainResource, ChainError> {
        let resource = ResourceName::parse(name)?;

        let selection = match resource.scope {
            ProtocolScope::Any => self.default_selection().clone(),
            scope => select(&self.facts, &self.tools, &scope.families()),
        };

        let Some(provider) = selection.provider else {
            return Err(ChainError::NoProviderSelected {
                name: name.to_string(),
                reasons: selection.rejected,
            });
        };

        if resource.is_builtin() {
            debug!(name = %name, "resource refers to a built-in chain");
        }
        debug!(name = %name, %provider, "materialized chain resource");

        Ok(ChainResource {
            name: name.to_string(),
            resource,
            provider,
        })
    }
}
