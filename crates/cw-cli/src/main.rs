use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use cw_core::identity::{aliases, canonical_name};
use cw_core::{
    ChainRecord, ChainStatus, Config, Family, FamilyFailure, Inventory, ProviderSelector,
    ToolAvailability, reconcile,
};
use cw_tables::{
    ChainEnumerator, FallbackLocator, PathLocator, StaticLocator, SystemExecutor, probe_tools,
    records_from_save,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chainwarden")]
#[command(version, about = "Discover iptables, ip6tables and ebtables chains", long_about = None)]
struct Cli {
    /// Configuration file (defaults to /etc/chainwarden/config.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use a fixed path for a tool, e.g. --tool ebtables-save=/usr/sbin/ebtables-legacy-save
    #[arg(long = "tool", value_name = "NAME=PATH", global = true)]
    tools: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every chain on this host
    Chains {
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the chains a name refers to
    Resolve { name: String },
    /// Show tool availability and provider selection
    Provider {
        /// Chain resource name to bind to a provider
        name: Option<String>,
    },
    /// Compare desired chains with the live state
    Check {
        /// YAML file with a `resources` list (defaults to the config's)
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Parse a saved dump instead of running the save tools
    Parse {
        #[arg(long, value_parser = parse_family)]
        family: Family,
        /// Dump file; standard input when omitted
        file: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

fn parse_family(value: &str) -> Result<Family, String> {
    Family::ALL
        .into_iter()
        .find(|family| family.runtime_tool() == value)
        .ok_or_else(|| format!("unknown family '{value}' (expected iptables, ip6tables or ebtables)"))
}

/// State shared by the commands of one invocation
struct Session {
    config: Config,
    selector: ProviderSelector,
}

impl Session {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
        for spec in &cli.tools {
            config.add_tool_override(spec)?;
        }

        let locator = FallbackLocator {
            primary: StaticLocator::new(config.tools.clone()),
            fallback: PathLocator::system(&config.search_paths),
        };
        let tools = probe_tools(&locator);
        let facts = config.host_facts();
        debug!(kernel = %facts.kernel, os = %facts.operatingsystem, "host facts");

        Ok(Self {
            config,
            selector: ProviderSelector::new(facts, tools),
        })
    }

    fn tools(&self) -> &ToolAvailability {
        self.selector.tools()
    }

    fn enumerate(&self) -> Inventory {
        ChainEnumerator::new(self.tools(), &SystemExecutor::new()).enumerate()
    }
}

#[derive(Serialize)]
struct RecordView<'a> {
    name: String,
    #[serde(flatten)]
    record: &'a ChainRecord,
}

fn views(records: &[ChainRecord]) -> Vec<RecordView<'_>> {
    records
        .iter()
        .map(|record| RecordView {
            name: canonical_name(record),
            record,
        })
        .collect()
}

/// Serialized output, or `None` when the caller renders text itself
fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<Option<String>> {
    Ok(match format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(value)? + "\n"),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
    })
}

fn print_records(records: &[ChainRecord]) {
    if records.is_empty() {
        println!("  (none)");
        return;
    }
    for record in records {
        println!("  • {:<40} {}", canonical_name(record), record.provider);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Chains { format } => handle_chains(&Session::open(&cli)?, *format),
        Commands::Resolve { name } => handle_resolve(&Session::open(&cli)?, name),
        Commands::Provider { name } => handle_provider(&Session::open(&cli)?, name.as_deref()),
        Commands::Check { file, format } => {
            handle_check(&Session::open(&cli)?, file.as_deref(), *format)
        }
        Commands::Parse {
            family,
            file,
            format,
        } => handle_parse(*family, file.as_deref(), *format),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_chains(session: &Session, format: OutputFormat) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct Output<'a> {
        chains: Vec<RecordView<'a>>,
        failures: &'a [FamilyFailure],
    }

    let inventory = session.enumerate();
    let output = Output {
        chains: views(inventory.records()),
        failures: inventory.failures(),
    };

    match render(&output, format)? {
        Some(out) => print!("{}", out),
        None => {
            println!("🔥 Chains ({}):", inventory.len());
            print_records(inventory.records());
        }
    }

    for failure in inventory.failures() {
        eprintln!("⚠️  {}: {}", failure.family, failure.error);
    }

    let available = session.tools().available_families().len();
    if available > 0 && inventory.failures().len() == available {
        bail!("every available save tool failed");
    }
    Ok(())
}

fn handle_resolve(session: &Session, name: &str) -> anyhow::Result<()> {
    let inventory = session.enumerate();
    let found: Vec<ChainRecord> = inventory.lookup(name).into_iter().cloned().collect();

    if found.is_empty() {
        bail!("no chain matches '{}'", name);
    }

    println!("🔎 '{}' matches {} chain(s):", name, found.len());
    for record in &found {
        println!("  • {} [{}]", canonical_name(record), record.provider);
        println!("    aliases: {}", aliases(record).join(", "));
    }
    Ok(())
}

fn handle_provider(session: &Session, name: Option<&str>) -> anyhow::Result<()> {
    let facts = session.selector.facts();
    println!("🖥️  Host: kernel {}, {}", facts.kernel, facts.operatingsystem);

    println!("\n🧰 Tools:");
    for (tool, path) in session.tools().iter() {
        match path {
            Some(path) => println!("  ✅ {:<16} {}", tool, path.display()),
            None => println!("  ❌ {:<16} not found", tool),
        }
    }

    let selection = session.selector.default_selection();
    println!("\n📌 Default provider:");
    match selection.provider {
        Some(provider) => println!("  {}", provider),
        None => println!("  (none)"),
    }
    for reason in &selection.rejected {
        println!("  skipped: {}", reason);
    }

    if let Some(name) = name {
        let resource = session.selector.materialize(name)?;
        println!("\n🔗 '{}' is governed by {}", resource.name, resource.provider);
        if resource.resource.is_builtin() {
            println!("   (built-in chain)");
        }
    }
    Ok(())
}

fn handle_check(
    session: &Session,
    file: Option<&std::path::Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let desired = match file {
        Some(path) => {
            Config::from_file(path)
                .with_context(|| format!("failed to load resources from {}", path.display()))?
                .resources
        }
        None => session.config.resources.clone(),
    };

    if desired.is_empty() {
        println!("No resources declared");
        return Ok(());
    }

    let inventory = session.enumerate();
    for failure in inventory.failures() {
        eprintln!("⚠️  {}: {}", failure.family, failure.error);
    }

    let statuses = reconcile(&desired, &inventory, &session.selector);
    match render(&statuses, format)? {
        Some(out) => print!("{}", out),
        None => print_statuses(&statuses),
    }

    let failing = statuses.iter().filter(|s| !s.is_ok()).count();
    if failing > 0 {
        bail!("{} of {} chain resource(s) out of sync", failing, statuses.len());
    }
    Ok(())
}

fn print_statuses(statuses: &[ChainStatus]) {
    for status in statuses {
        let icon = if status.is_ok() { "✅" } else { "❌" };
        let provider = status
            .provider
            .map(|p| p.to_string())
            .unwrap_or_else(|| "no provider".to_string());
        println!(
            "{} {} (ensure {}, {}, {} match(es))",
            icon,
            status.name,
            status.ensure,
            provider,
            status.matches.len()
        );
        if let Some(error) = &status.error {
            println!("   💡 {}", error);
        }
    }
}

fn handle_parse(
    family: Family,
    file: Option<&std::path::Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read standard input")?;
            buf
        }
    };

    let records = records_from_save(&raw, family);
    match render(&views(&records), format)? {
        Some(out) => print!("{}", out),
        None => {
            println!("🔥 {} chains ({}):", family, records.len());
            print_records(&records);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_family_names() {
        assert_eq!(parse_family("ip6tables"), Ok(Family::Ip6tables));
        assert!(parse_family("nft").is_err());
    }

    #[test]
    fn global_tool_overrides() {
        let cli = Cli::try_parse_from([
            "chainwarden",
            "chains",
            "--tool",
            "iptables-save=/opt/iptables-save",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.tools, vec!["iptables-save=/opt/iptables-save"]);
        assert_eq!(cli.verbose, 2);
    }
}
