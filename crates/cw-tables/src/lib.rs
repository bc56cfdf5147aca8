pub mod enumerate;
pub mod executor;
pub mod locator;
pub mod save;

pub use enumerate::{ChainEnumerator, records_from_save};
pub use executor::{CommandExecutor, ExecError, SystemExecutor};
pub use locator::{FallbackLocator, PathLocator, StaticLocator, ToolLocator, probe_tools};
pub use save::{SaveEntry, SaveParser};
