//! `extindex` command-line entry point.
//!
//! # Responsibility
//! - Write an extension index into a build output directory.
//! - Run one discovery pass over a host class path and plugin class paths
//!   and print the scope mapping.
//!
//! # Invariants
//! - Discovery output order is: unscoped first, then plugins in argument order.
//! - Unexpected I/O failures go to the log at error level, never to stdout.

use clap::{Parser, Subcommand, ValueEnum};
use extindex_core::{
    default_log_level, init_logging, ClassPath, Diagnostics, ExtensionFinder, ExtensionIndex,
    Filer, IndexProcessor, IndexSettings, IndexStorage, LogDiagnostics, LogTarget,
    ResourceLoader, ScopeKey, ScopeRegistry, ScopeRegistryError, SettingsError,
    StaticClassifier, StorageLayout, WriteOutcome,
};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const STDERR_LOG_LEVEL: &str = "warn";

const EXIT_OK: u8 = 0;
const EXIT_WRITE_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "extindex",
    version,
    about = "Write and discover extension index resources"
)]
struct Cli {
    #[arg(long, global = true, help = "Log level: trace|debug|info|warn|error")]
    log_level: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Absolute directory for rolling log files (default: stderr)"
    )]
    log_dir: Option<String>,
    #[arg(long, global = true, value_name = "FILE", help = "JSON settings file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_enum, help = "Index layout (overrides --config)")]
    layout: Option<LayoutArg>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an index resource into a build output directory.
    Write {
        #[arg(long, value_name = "DIR", help = "Build output root")]
        output: PathBuf,
        #[arg(long, value_name = "NAME", help = "Extension point the entries belong to")]
        point: Option<String>,
        #[arg(long, help = "Keep entries of an index already present in the output")]
        merge: bool,
        #[arg(required = true, help = "Entries, typically fully-qualified type names")]
        entries: Vec<String>,
    },
    /// Discover index entries per scope.
    Discover {
        #[arg(long = "host", value_name = "PATH", help = "Host class-path entry (repeatable)")]
        hosts: Vec<PathBuf>,
        #[arg(
            long = "plugin",
            value_name = "ID=PATH[,PATH...]",
            value_parser = parse_plugin_arg,
            help = "Plugin scope and its class-path entries (repeatable)"
        )]
        plugins: Vec<PluginArg>,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Legacy,
    ServiceProvider,
}

impl From<LayoutArg> for StorageLayout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::Legacy => StorageLayout::Legacy,
            LayoutArg::ServiceProvider => StorageLayout::ServiceProvider,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PluginArg {
    id: String,
    paths: Vec<PathBuf>,
}

fn parse_plugin_arg(raw: &str) -> Result<PluginArg, String> {
    let (id, paths) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=PATH[,PATH...], got `{raw}`"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("plugin id is empty in `{raw}`"));
    }
    let paths: Vec<PathBuf> = paths
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect();
    if paths.is_empty() {
        return Err(format!("plugin `{id}` has no class-path entries"));
    }
    Ok(PluginArg {
        id: id.to_string(),
        paths,
    })
}

#[derive(Debug)]
enum CliError {
    Config { path: PathBuf, message: String },
    Settings(SettingsError),
    Logging(String),
    Registry(ScopeRegistryError),
    Render(serde_json::Error),
    Output(io::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        EXIT_USAGE
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config { path, message } => {
                write!(f, "cannot load settings `{}`: {message}", path.display())
            }
            Self::Settings(err) => write!(f, "invalid settings: {err}"),
            Self::Logging(message) => write!(f, "cannot initialize logging: {message}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "cannot render output: {err}"),
            Self::Output(err) => write!(f, "cannot write output: {err}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Settings(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::Output(err) => Some(err),
            Self::Config { .. } | Self::Logging(_) => None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = init_cli_logging(cli.log_level.as_deref(), cli.log_dir.as_deref())
        .and_then(|()| run(cli, Arc::new(LogDiagnostics), &mut io::stdout().lock()));
    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("extindex: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Runs one parsed command; logging must already be set up by the caller.
fn run(
    cli: Cli,
    diagnostics: Arc<dyn Diagnostics>,
    out: &mut dyn Write,
) -> Result<u8, CliError> {
    let settings = load_settings(cli.config.as_ref(), cli.layout)?;

    match cli.command {
        Command::Write {
            output,
            point,
            merge,
            entries,
        } => run_write(settings, diagnostics, output, point, merge, &entries, out),
        Command::Discover {
            hosts,
            plugins,
            json,
        } => run_discover(settings, diagnostics, hosts, plugins, json, out),
    }
}

fn init_cli_logging(level: Option<&str>, log_dir: Option<&str>) -> Result<(), CliError> {
    let (target, default_level) = match log_dir {
        Some(dir) => (
            LogTarget::directory(dir).map_err(CliError::Logging)?,
            default_log_level(),
        ),
        None => (LogTarget::Stderr, STDERR_LOG_LEVEL),
    };
    init_logging(level.unwrap_or(default_level), target).map_err(CliError::Logging)
}

fn load_settings(
    config: Option<&PathBuf>,
    layout: Option<LayoutArg>,
) -> Result<IndexSettings, CliError> {
    let mut settings = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|err| CliError::Config {
                path: path.clone(),
                message: err.to_string(),
            })?;
            serde_json::from_str::<IndexSettings>(&text).map_err(|err| CliError::Config {
                path: path.clone(),
                message: err.to_string(),
            })?
        }
        None => IndexSettings::default(),
    };
    if let Some(layout) = layout {
        settings.layout = layout.into();
    }
    settings.validate().map_err(CliError::Settings)?;
    Ok(settings)
}

fn run_write(
    settings: IndexSettings,
    diagnostics: Arc<dyn Diagnostics>,
    output: PathBuf,
    point: Option<String>,
    merge: bool,
    entries: &[String],
    out: &mut dyn Write,
) -> Result<u8, CliError> {
    let mut classifier = StaticClassifier::new();
    for entry in entries {
        if !classifier.add(point.as_deref(), entry) {
            warn!("event=cli_write module=cli status=skipped reason=empty_entry raw={entry:?}");
        }
    }

    let filer = Filer::new(output);
    let processor =
        IndexProcessor::new(IndexStorage::new(settings, diagnostics)).merge_previous(merge);
    let outcome = processor.process(&classifier, &filer);
    filer.close();

    if let WriteOutcome::Written { resources, entries } = &outcome {
        for resource in resources {
            writeln!(out, "{}", filer.output_root().join(resource).display())
                .map_err(CliError::Output)?;
        }
        info!(
            "event=cli_write module=cli status=ok resources={} entries={}",
            resources.len(),
            entries
        );
    }
    Ok(write_exit_code(&outcome))
}

fn write_exit_code(outcome: &WriteOutcome) -> u8 {
    match outcome {
        WriteOutcome::Written { .. } => EXIT_OK,
        WriteOutcome::Skipped(reason) => {
            warn!("event=cli_write module=cli status=skipped reason={reason:?}");
            EXIT_OK
        }
        WriteOutcome::Failed => EXIT_WRITE_FAILED,
    }
}

fn run_discover(
    settings: IndexSettings,
    diagnostics: Arc<dyn Diagnostics>,
    hosts: Vec<PathBuf>,
    plugins: Vec<PluginArg>,
    json: bool,
    out: &mut dyn Write,
) -> Result<u8, CliError> {
    let host: Arc<dyn ResourceLoader> = Arc::new(
        hosts
            .into_iter()
            .fold(ClassPath::new(), |class_path, path| class_path.path(path)),
    );

    let mut registry = ScopeRegistry::new();
    for plugin in plugins {
        let loader = plugin
            .paths
            .into_iter()
            .fold(ClassPath::with_parent(host.clone()), |class_path, path| {
                class_path.path(path)
            });
        registry
            .register(&plugin.id, Arc::new(loader))
            .map_err(CliError::Registry)?;
    }

    let finder = ExtensionFinder::new(settings, diagnostics);
    let index = finder.discover(host.as_ref(), &registry);

    let rendered = if json {
        render_json(&index).map_err(CliError::Render)?
    } else {
        render_text(&index)
    };
    out.write_all(rendered.as_bytes()).map_err(CliError::Output)?;
    Ok(EXIT_OK)
}

#[derive(Serialize)]
struct ScopeReport<'a> {
    scope: &'a ScopeKey,
    entries: Vec<&'a str>,
}

fn render_json(index: &ExtensionIndex) -> Result<String, serde_json::Error> {
    let reports: Vec<ScopeReport<'_>> = index
        .iter()
        .map(|(scope, bucket)| ScopeReport {
            scope,
            entries: bucket.iter().map(String::as_str).collect(),
        })
        .collect();
    let mut rendered = serde_json::to_string_pretty(&reports)?;
    rendered.push('\n');
    Ok(rendered)
}

fn render_text(index: &ExtensionIndex) -> String {
    let mut rendered = String::new();
    for (scope, bucket) in index.iter() {
        rendered.push_str(&format!("{scope}\n"));
        if bucket.is_empty() {
            rendered.push_str("  (no extensions)\n");
        }
        for entry in bucket {
            rendered.push_str(&format!("  {entry}\n"));
        }
    }
    rendered
}
