use anyhow::{bail, Context, Result};
use marrow::{
    config::{self, AppConfig},
    ident::ModKey,
    logging,
    manager::{ModManager, DEFAULT_PAGE_SIZE},
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct GlobalOptions {
    format: OutputFormat,
    data_dir: Option<PathBuf>,
    verbosity: u8,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Search {
        query: Option<String>,
        limit: usize,
        offset: usize,
    },
    Show(ModKey),
    Install {
        key: ModKey,
        version: Option<String>,
    },
    Uninstall(ModKey),
    Blacklist(ModKey),
    Whitelist(ModKey),
    Blacklisted,
    Installed,
    GameDir(Option<PathBuf>),
    Notifications,
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args)?;
    let command = parse_command(&tokens)?;
    match command {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            println!("marrow v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let data_dir = config::resolve_data_dir(global.data_dir.as_deref())?;
    let _guard = logging::setup_logging(&data_dir.join("logs"), global.verbosity)?;
    let config = AppConfig::load_or_create(&data_dir)?;
    let mut manager = ModManager::open(&data_dir, config);
    run_command(&mut manager, command, global.format)
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut format = OutputFormat::Text;
    let mut data_dir = None;
    let mut verbosity = 0u8;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            format = parse_format(value)?;
            continue;
        }
        if let Some(value) = arg.strip_prefix("--data-dir=") {
            data_dir = Some(PathBuf::from(value));
            continue;
        }
        match arg.as_str() {
            "--format" => {
                let value = iter.next().context("--format requires a value")?;
                format = parse_format(value)?;
            }
            "--data-dir" => {
                let value = iter.next().context("--data-dir requires a path")?;
                data_dir = Some(PathBuf::from(value));
            }
            "--verbose" => verbosity = verbosity.max(1),
            "-h" | "--help" => tokens.push("help".to_string()),
            "-V" | "--version" => tokens.push("version".to_string()),
            _ if arg.starts_with("-v") && arg.chars().skip(1).all(|ch| ch == 'v') => {
                let count = arg.chars().filter(|ch| *ch == 'v').count();
                verbosity = count.min(u8::MAX as usize) as u8;
            }
            _ => tokens.push(arg.to_string()),
        }
    }

    Ok((
        GlobalOptions {
            format,
            data_dir,
            verbosity,
        },
        tokens,
    ))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    match OutputFormat::parse(value) {
        Some(format) => Ok(format),
        None => bail!("Unknown format: {value} (use 'json' or 'text')"),
    }
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "help" => CliCommand::Help,
        "version" => CliCommand::Version,
        "search" | "list" => parse_search(rest)?,
        "show" => CliCommand::Show(parse_mod_target(head, rest)?.0),
        "install" => {
            let (key, extra) = parse_mod_target(head, rest)?;
            CliCommand::Install {
                key,
                version: extra.first().cloned(),
            }
        }
        "uninstall" => CliCommand::Uninstall(parse_mod_target(head, rest)?.0),
        "blacklist" => CliCommand::Blacklist(parse_mod_target(head, rest)?.0),
        "whitelist" => CliCommand::Whitelist(parse_mod_target(head, rest)?.0),
        "blacklisted" => CliCommand::Blacklisted,
        "installed" => CliCommand::Installed,
        "game-dir" => CliCommand::GameDir(rest.first().map(PathBuf::from)),
        "notifications" | "updates" => CliCommand::Notifications,
        "paths" => CliCommand::Paths,
        other => bail!("Unknown command: {other} (see 'marrow help')"),
    };
    Ok(command)
}

fn parse_search(args: &[String]) -> Result<CliCommand> {
    let mut query = None;
    let mut limit = DEFAULT_PAGE_SIZE;
    let mut offset = 0;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--limit" => {
                let value = iter.next().context("--limit requires a number")?;
                limit = value.parse().with_context(|| format!("invalid --limit {value}"))?;
            }
            "--offset" => {
                let value = iter.next().context("--offset requires a number")?;
                offset = value
                    .parse()
                    .with_context(|| format!("invalid --offset {value}"))?;
            }
            value => {
                query = Some(match query {
                    Some(existing) => format!("{existing} {value}"),
                    None => value.to_string(),
                });
            }
        }
    }
    Ok(CliCommand::Search {
        query,
        limit,
        offset,
    })
}

/// Accepts `namespace.name` or `namespace name`; returns the leftovers.
fn parse_mod_target<'a>(command: &str, args: &'a [String]) -> Result<(ModKey, &'a [String])> {
    match args {
        [single, rest @ ..] if single.contains('.') => Ok((ModKey::parse(single)?, rest)),
        [namespace, name, rest @ ..] => Ok((ModKey::new(namespace, name)?, rest)),
        _ => bail!("{command} requires <namespace> <name> or <namespace>.<name>"),
    }
}

fn run_command(manager: &mut ModManager, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::Search {
            query,
            limit,
            offset,
        } => {
            let mods = manager.list_mods(query.as_deref(), limit, offset)?;
            emit(format, &mods, || {
                for item in &mods {
                    println!(
                        "{key:<40} {version:<10} {downloads:>9}  {summary}",
                        key = format!("{}.{}", item.namespace, item.name),
                        version = item.latest_version,
                        downloads = item.downloads,
                        summary = item.summary
                    );
                }
            })
        }
        CliCommand::Show(key) => {
            let detail = manager.mod_detail(key.namespace(), key.name())?;
            emit(format, &detail, || {
                println!("{} ({key})", detail.summary.display_name);
                println!("  owner:    {}", detail.summary.owner);
                println!("  latest:   {}", detail.summary.latest_version);
                println!("  versions: {}", detail.versions.len());
                if !detail.dependencies.is_empty() {
                    println!("  requires: {}", detail.dependencies.join(", "));
                }
                if !detail.description.is_empty() {
                    println!();
                    println!("{}", detail.description);
                }
            })
        }
        CliCommand::Install { key, version } => {
            let installed = manager.install(key.namespace(), key.name(), version.as_deref())?;
            emit(format, &installed, || {
                println!(
                    "Installed {key} {} ({} files)",
                    installed.version,
                    installed.installed_files.len()
                );
            })
        }
        CliCommand::Uninstall(key) => {
            let outcome = manager.uninstall(key.namespace(), key.name())?;
            let status = StatusReply::ok();
            emit(format, &status, || match &outcome {
                Some((removed, report)) => println!(
                    "Uninstalled {key} {} ({} removed, {} already gone)",
                    removed.version, report.removed, report.missing
                ),
                None => println!("{key} is not installed"),
            })
        }
        CliCommand::Blacklist(key) => {
            manager.blacklist(key.namespace(), key.name())?;
            emit(format, &StatusReply::ok(), || println!("Blacklisted {key}"))
        }
        CliCommand::Whitelist(key) => {
            manager.whitelist(key.namespace(), key.name())?;
            emit(format, &StatusReply::ok(), || println!("Whitelisted {key}"))
        }
        CliCommand::Blacklisted => {
            let keys = manager.blacklisted();
            emit(format, &keys, || {
                for key in &keys {
                    println!("{key}");
                }
            })
        }
        CliCommand::Installed => {
            let mods = manager.installed_mods();
            emit(format, &mods, || {
                for item in &mods {
                    println!(
                        "{key:<40} {version:<10} {files:>4} files  {name}",
                        key = format!("{}.{}", item.namespace, item.name),
                        version = item.version,
                        files = item.installed_files.len(),
                        name = item.display_name
                    );
                }
            })
        }
        CliCommand::GameDir(path) => {
            if let Some(path) = path {
                manager.set_game_directory(&path)?;
            }
            let settings = manager.settings();
            emit(format, &settings, || match &settings.game_directory {
                Some(dir) => println!("{}", dir.display()),
                None => println!("(not set)"),
            })
        }
        CliCommand::Notifications => {
            let notices = manager.notifications();
            emit(format, &notices, || {
                if notices.is_empty() {
                    println!("All installed mods are up to date");
                }
                for notice in &notices {
                    println!(
                        "{}.{}: {} -> {}  {}",
                        notice.namespace,
                        notice.name,
                        notice.current_version,
                        notice.latest_version,
                        notice.display_name
                    );
                }
            })
        }
        CliCommand::Paths => {
            let paths = PathsReply::new(manager);
            emit(format, &paths, || {
                println!("data dir:   {}", paths.data_dir.display());
                println!("state file: {}", paths.state_file.display());
                println!("scratch:    {}", paths.scratch_dir.display());
                println!("registry:   {}", paths.registry_url);
                match &paths.game_directory {
                    Some(dir) => println!("game dir:   {}", dir.display()),
                    None => println!("game dir:   (not set)"),
                }
            })
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusReply {
    status: &'static str,
}

impl StatusReply {
    fn ok() -> Self {
        Self { status: "ok" }
    }
}

#[derive(Serialize)]
struct PathsReply {
    data_dir: PathBuf,
    state_file: PathBuf,
    scratch_dir: PathBuf,
    registry_url: String,
    game_directory: Option<PathBuf>,
}

impl PathsReply {
    fn new(manager: &ModManager) -> Self {
        Self {
            data_dir: manager.data_dir().to_path_buf(),
            state_file: manager.state_path().to_path_buf(),
            scratch_dir: manager.scratch_dir(),
            registry_url: manager.config().registry_url.clone(),
            game_directory: manager.settings().game_directory,
        }
    }
}

fn print_help() {
    println!("marrow v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  marrow search [query] [--limit N] [--offset N]  Search the registry");
    println!("  marrow show <mod>                               Show package details");
    println!("  marrow install <mod> [version]                  Install a mod and its dependencies");
    println!("  marrow uninstall <mod>                          Remove an installed mod's files");
    println!("  marrow blacklist <mod>                          Block a mod from being installed");
    println!("  marrow whitelist <mod>                          Lift a blacklist entry");
    println!("  marrow blacklisted                              List blacklisted mods");
    println!("  marrow installed                                List installed mods");
    println!("  marrow game-dir [path]                          Show or set the game directory");
    println!("  marrow notifications                            List available updates");
    println!("  marrow paths                                    Show data and game paths");
    println!();
    println!("<mod> is <namespace>.<name> or <namespace> <name>.");
    println!();
    println!("Global options:");
    println!("  --format <json|text>            Output format");
    println!(
        "  --data-dir <path>               Data directory (default: ${})",
        config::DATA_DIR_ENV
    );
    println!("  -v, -vv, --verbose              Increase console log level");
    println!("  -h, --help                      Show help");
    println!("  -V, --version                   Show version");
}
