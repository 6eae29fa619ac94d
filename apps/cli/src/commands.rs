//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use budgetlens_classifier::OpenAiClassifier;
use budgetlens_core::session::{self, EnrichTarget};
use budgetlens_core::{AppContext, EnrichmentProgress, FieldHints, analyze_files, outline};
use budgetlens_extract::SourceFile;
use budgetlens_shared::{
    AppConfig, Item, init_config, load_config, parse_item_list, session_db_path, validate_api_key,
};
use budgetlens_storage::SessionStore;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// BudgetLens: extract and label budget line items.
#[derive(Parser)]
#[command(
    name = "budgetlens",
    version,
    about = "Extract, structure and label line items from budget estimate documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract, filter and score items from files, and open a session with them.
    Analyze {
        /// Spreadsheets (.xlsx/.xls), PDFs, or images (.png/.jpg/.jpeg).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge items into a session.
    Merge {
        /// Session key.
        #[arg(long)]
        session: String,

        /// JSON file with an item array (or an object with a `tasks` array).
        #[arg(long)]
        tasks: PathBuf,
    },

    /// Assign a parent to every relevant item of a session.
    Hierarchy {
        /// Session key.
        #[arg(long)]
        session: String,

        /// Items to merge in first.
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Label items with category codes and a funding source.
    Enrich {
        /// Enrich the items stored in this session.
        #[arg(long, conflicts_with = "tasks", required_unless_present = "tasks")]
        session: Option<String>,

        /// Enrich the items in this JSON file instead.
        #[arg(long)]
        tasks: Option<PathBuf>,

        /// JSON file with candidate codes and sources.
        #[arg(long)]
        hints: PathBuf,
    },

    /// Compute order paths from a spreadsheet's label column.
    Outline {
        /// Spreadsheet to read.
        file: PathBuf,

        /// Header of the label column (e.g. "STT").
        #[arg(long)]
        column: String,
    },

    /// Session store management.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Session subcommands.
#[derive(Subcommand)]
pub(crate) enum SessionAction {
    /// Print the items stored under a key.
    Show {
        /// Session key.
        key: String,
    },
    /// Delete expired sessions.
    Purge,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "budgetlens=info",
        1 => "budgetlens=debug",
        _ => "budgetlens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze { files } => cmd_analyze(&files).await,
        Command::Merge { session, tasks } => cmd_merge(&session, &tasks).await,
        Command::Hierarchy { session, tasks } => cmd_hierarchy(&session, tasks.as_deref()).await,
        Command::Enrich {
            session,
            tasks,
            hints,
        } => cmd_enrich(session, tasks.as_deref(), &hints).await,
        Command::Outline { file, column } => cmd_outline(&file, &column),
        Command::Session { action } => match action {
            SessionAction::Show { key } => cmd_session_show(&key).await,
            SessionAction::Purge => cmd_session_purge().await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Load config, check the classifier key, and build the full context.
async fn classifier_context() -> Result<AppContext<OpenAiClassifier>> {
    let config = load_config()?;
    validate_api_key(&config)?;
    Ok(AppContext::open(config).await?)
}

async fn open_store(config: &AppConfig) -> Result<SessionStore> {
    let path = session_db_path(config)?;
    Ok(SessionStore::open(&path, config.session.ttl()).await?)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Input files
// ---------------------------------------------------------------------------

fn read_source(path: &Path) -> Result<SourceFile> {
    load_source(path).wrap_err_with(|| format!("cannot read {}", path.display()))
}

fn load_source(path: &Path) -> std::io::Result<SourceFile> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile::new(name, bytes))
}

/// Read every path; a path that cannot be read becomes an error message.
fn read_sources(paths: &[PathBuf]) -> (Vec<SourceFile>, Vec<String>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    for path in paths {
        match load_source(path) {
            Ok(file) => files.push(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read file");
                errors.push(format!("{}: cannot read file: {e}", path.display()));
            }
        }
    }
    (files, errors)
}

/// Read an item payload. Anything but a list (or `{"tasks": [...]}`) fails
/// here, before the session store is touched.
fn read_items(path: &Path) -> Result<Vec<Item>> {
    let text =
        std::fs::read_to_string(path).wrap_err_with(|| format!("cannot read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .wrap_err_with(|| format!("{} is not valid JSON", path.display()))?;
    Ok(parse_item_list(value)?)
}

/// Hint file layout: `{"sub_kind_items": {"name": [..], "info": [..]}, "sources": {"name": [..]}}`.
#[derive(Debug, Default, Deserialize)]
struct HintsFile {
    #[serde(default)]
    sub_kind_items: CategoryHints,
    #[serde(default)]
    sources: SourceHints,
}

#[derive(Debug, Default, Deserialize)]
struct CategoryHints {
    #[serde(default)]
    name: Vec<String>,
    #[serde(default)]
    info: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceHints {
    #[serde(default)]
    name: Vec<String>,
}

impl From<HintsFile> for FieldHints {
    fn from(file: HintsFile) -> Self {
        Self {
            category_codes: file.sub_kind_items.name,
            category_info: file.sub_kind_items.info,
            funding_sources: file.sources.name,
        }
    }
}

fn read_hints(path: &Path) -> Result<FieldHints> {
    let text =
        std::fs::read_to_string(path).wrap_err_with(|| format!("cannot read {}", path.display()))?;
    parse_hints(&text).wrap_err_with(|| format!("invalid hints in {}", path.display()))
}

fn parse_hints(text: &str) -> Result<FieldHints> {
    let file: HintsFile = serde_json::from_str(text)?;
    Ok(file.into())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AnalyzeOutput {
    session_key: String,
    tasks: Vec<Item>,
    errors: Vec<String>,
}

async fn cmd_analyze(paths: &[PathBuf]) -> Result<()> {
    let (files, mut errors) = read_sources(paths);
    if files.is_empty() {
        return Err(eyre!("no input file could be read: {}", errors.join("; ")));
    }
    let ctx = classifier_context().await?;

    info!(files = files.len(), "analyzing files");
    let progress = CliProgress::new();
    let result = analyze_files(&ctx, files, &progress).await;
    progress.finish();
    let result = result?;

    errors.extend(result.errors);
    let session_key = session::create_session(&ctx, &result.items).await?;
    print_json(&AnalyzeOutput {
        session_key,
        tasks: result.items,
        errors,
    })
}

async fn cmd_merge(key: &str, tasks: &Path) -> Result<()> {
    let items = read_items(tasks)?;
    let config = load_config()?;
    let store = open_store(&config).await?;

    let merged = session::append_and_merge(&store, key, items).await?;
    info!(session = key, items = merged.len(), "items merged");
    print_json(&merged)
}

async fn cmd_hierarchy(key: &str, tasks: Option<&Path>) -> Result<()> {
    let items = match tasks {
        Some(path) => read_items(path)?,
        None => Vec::new(),
    };
    let ctx = classifier_context().await?;

    let progress = CliProgress::new();
    let result = session::assign_parents(&ctx, key, items, &progress).await;
    progress.finish();
    print_json(&result?)
}

async fn cmd_enrich(session: Option<String>, tasks: Option<&Path>, hints: &Path) -> Result<()> {
    let hints = read_hints(hints)?;
    let target = match (session, tasks) {
        (Some(key), _) => EnrichTarget::Session(key),
        (None, Some(path)) => EnrichTarget::Items(read_items(path)?),
        (None, None) => return Err(eyre!("either --session or --tasks is required")),
    };
    let ctx = classifier_context().await?;

    let progress = CliProgress::new();
    let result = session::enrich(&ctx, target, &hints, &progress).await;
    progress.finish();
    print_json(&result?)
}

fn cmd_outline(path: &Path, column: &str) -> Result<()> {
    let config = load_config()?;
    let file = read_source(path)?;
    let items = outline(&file, column, &config.filters)?;
    print_json(&items)
}

async fn cmd_session_show(key: &str) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    print_json(&session::show_session(&store, key).await?)
}

async fn cmd_session_purge() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let purged = session::purge_expired(&store).await?;
    println!("Purged {purged} expired session(s)");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner on stderr; stdout stays clean for JSON output.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl EnrichmentProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {detail}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_file_maps_to_field_hints() {
        let hints = parse_hints(
            r#"{"sub_kind_items": {"name": ["071", "072"], "info": ["Mầm non"]},
                "sources": {"name": ["12", "13"]}}"#,
        )
        .expect("parse");
        assert_eq!(hints.category_codes, vec!["071", "072"]);
        assert_eq!(hints.category_info, vec!["Mầm non"]);
        assert_eq!(hints.funding_sources, vec!["12", "13"]);
    }

    #[test]
    fn missing_hint_sections_are_empty() {
        let hints = parse_hints(r#"{"sources": {"name": ["13"]}}"#).expect("parse");
        assert!(hints.category_codes.is_empty());
        assert_eq!(hints.funding_sources, vec!["13"]);
    }

    #[test]
    fn unreadable_input_is_reported_and_the_rest_is_read() {
        let dir = std::env::temp_dir();
        let present = dir.join(format!("bl_test_{}.png", uuid::Uuid::now_v7()));
        let missing = dir.join(format!("bl_test_{}.xlsx", uuid::Uuid::now_v7()));
        std::fs::write(&present, [0u8, 1, 2]).expect("write input");

        let (files, errors) = read_sources(&[missing.clone(), present.clone()]);
        let _ = std::fs::remove_file(&present);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].bytes, vec![0, 1, 2]);
        assert_eq!(errors.len(), 1);
        assert!(
            errors[0].starts_with(&format!("{}: cannot read file: ", missing.display())),
            "{errors:?}"
        );
    }

    #[test]
    fn cli_parses_enrich_with_session() {
        let cli = Cli::try_parse_from([
            "budgetlens",
            "enrich",
            "--session",
            "abc",
            "--hints",
            "hints.json",
        ])
        .expect("parse");
        assert!(matches!(cli.command, Command::Enrich { session: Some(_), .. }));
    }

    #[test]
    fn cli_rejects_enrich_without_target() {
        assert!(Cli::try_parse_from(["budgetlens", "enrich", "--hints", "h.json"]).is_err());
    }
}
