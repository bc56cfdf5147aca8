pub mod chain;
pub mod config;
pub mod error;
pub mod facts;
pub mod identity;
pub mod inventory;
pub mod provider;
pub mod reconcile;
pub mod tools;

pub use chain::{ChainRecord, Family, Protocol, Provider};
pub use config::Config;
pub use error::{ChainError, ConfigError};
pub use facts::HostFacts;
pub use inventory::{FamilyFailure, Inventory};
pub use provider::{ChainResource, ProviderSelector, Selection};
pub use reconcile::{ChainStatus, DesiredChain, Ensure, reconcile};
pub use tools::ToolAvailability;
