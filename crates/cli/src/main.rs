//! AgeRun CLI
//!
//! Command-line host embedding the runtime: installs methods from files,
//! drives the dispatch loop, and persists state on shutdown.

use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, error, info, warn};

mod config;
mod methods;

use config::HostConfig;
use agerun_runtime::{InstructionParser, Log, Method, MethodError, System, VersionSelector};

#[derive(ClapParser)]
#[command(name = "agerun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AgeRun agent runtime host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent system: install methods, process all messages,
    /// persist and shut down
    Run {
        /// Host configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of .method files to install
        #[arg(long)]
        methods_dir: Option<PathBuf>,

        /// Directory for the snapshot files (defaults to the working
        /// directory)
        #[arg(long)]
        persist_dir: Option<PathBuf>,

        /// Bootstrap agent as NAME or NAME@VERSION (VERSION may be
        /// "latest")
        #[arg(long)]
        bootstrap: Option<String>,

        /// Log filter directive (overrides config and AGERUN_LOG)
        #[arg(long)]
        log: Option<String>,
    },

    /// Parse .method files and report errors without running anything
    Check {
        /// Method files to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            methods_dir,
            persist_dir,
            bootstrap,
            log,
        } => {
            if let Err(message) = run(config, methods_dir, persist_dir, bootstrap, log) {
                eprintln!("error: {}", message);
                process::exit(1);
            }
        }
        Commands::Check { paths } => {
            if !check(&paths) {
                process::exit(1);
            }
        }
    }
}

fn init_tracing(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;
    let filter = match filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_env("AGERUN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(
    config_path: Option<PathBuf>,
    methods_dir: Option<PathBuf>,
    persist_dir: Option<PathBuf>,
    bootstrap: Option<String>,
    log: Option<String>,
) -> Result<(), String> {
    let config = match &config_path {
        Some(path) => HostConfig::load(path).map_err(|e| e.to_string())?,
        None => HostConfig::default(),
    };

    // Flags override config file values.
    let methods_dir = methods_dir.or(config.methods_dir);
    let persist_dir = persist_dir
        .or(config.persist_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let log_filter = log.or(config.log_filter);
    init_tracing(log_filter.as_deref());

    let mut system = System::with_persist_dir(persist_dir);
    system.init(None);

    if let Some(dir) = methods_dir {
        install_methods(&mut system, &dir)?;
    }

    let bootstrap = match bootstrap {
        Some(spec) => Some(parse_bootstrap(&spec)?),
        None => config
            .bootstrap
            .map(|b| {
                let selector = match b.version.as_deref() {
                    None => VersionSelector::Latest,
                    Some(v) => VersionSelector::parse(v)
                        .ok_or_else(|| format!("invalid bootstrap version '{}'", v))?,
                };
                Ok::<_, String>((b.method, selector))
            })
            .transpose()?,
    };
    if let Some((name, selector)) = bootstrap {
        let id = system.create_agent(&name, &selector, None);
        if id == 0 {
            return Err(format!("bootstrap method '{}' not found", name));
        }
        info!(agent = id, method = %name, "bootstrap agent created");
    }

    let processed = system.process_all_messages();
    info!(processed, "all queues drained");
    system.shutdown();

    // Records were already emitted through tracing as they happened; the
    // summary gives scripts a single line to grep.
    let issues = system.log().take_all();
    if let Some(first) = issues.first() {
        warn!(count = issues.len(), "runtime reported issues, first: {}", first);
    }
    Ok(())
}

fn install_methods(system: &mut System, dir: &Path) -> Result<(), String> {
    let files = methods::load_methods_dir(dir).map_err(|e| e.to_string())?;
    for file in files {
        match system.register_method(&file.name, file.version, &file.source) {
            Ok(()) => info!(method = %file.name, version = %file.version, "method installed"),
            Err(MethodError::Duplicate(_)) => {
                // Already restored from the snapshot; the registered
                // definition wins.
                debug!(
                    method = %file.name,
                    version = %file.version,
                    "method already registered, file skipped"
                );
            }
            Err(e) => {
                // Surfaced, but the remaining installs still run.
                error!(method = %file.name, "could not install: {}", e);
            }
        }
    }
    Ok(())
}

fn parse_bootstrap(spec: &str) -> Result<(String, VersionSelector), String> {
    match spec.split_once('@') {
        None => Ok((spec.to_string(), VersionSelector::Latest)),
        Some((name, version)) => {
            let selector = VersionSelector::parse(version)
                .ok_or_else(|| format!("invalid bootstrap version '{}'", version))?;
            Ok((name.to_string(), selector))
        }
    }
}

/// Compile each file, printing diagnostics; returns whether all passed.
fn check(paths: &[PathBuf]) -> bool {
    let log = Log::new();
    let parser = InstructionParser::new(log.clone());
    let mut all_ok = true;
    for path in paths {
        let file = match methods::load_method_file(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("{}", e);
                all_ok = false;
                continue;
            }
        };
        match Method::compile(&parser, file.name.clone(), file.version, file.source) {
            Ok(method) => println!(
                "{}: {} {} ({} instructions)",
                path.display(),
                method.name(),
                method.version(),
                method.instructions().len()
            ),
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                all_ok = false;
            }
        }
        log.clear();
    }
    all_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use agerun_runtime::Version;

    #[test]
    fn test_parse_bootstrap_forms() {
        assert_eq!(
            parse_bootstrap("main").unwrap(),
            ("main".to_string(), VersionSelector::Latest)
        );
        assert_eq!(
            parse_bootstrap("main@latest").unwrap(),
            ("main".to_string(), VersionSelector::Latest)
        );
        assert_eq!(
            parse_bootstrap("main@2.1.0").unwrap(),
            (
                "main".to_string(),
                VersionSelector::Exact(Version::new(2, 1, 0))
            )
        );
        assert!(parse_bootstrap("main@nope").is_err());
    }
}
