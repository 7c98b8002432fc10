// LeadGrid CLI - inline-editable lead grid over the lead API
// `leadgrid grid` is interactive; the other commands are headless

mod exit_codes;
mod runtime;
mod tui;
mod util;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use exit_codes::{
    refusal_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_LOAD, EXIT_SAVE_FAILED, EXIT_SAVE_TIMEOUT,
    EXIT_SUCCESS, EXIT_USAGE, EXIT_VALIDATION,
};
use leadgrid_client::{ApiClient, ClientError, DEFAULT_PAGE};
use leadgrid_config::{ConfigError, Settings};
use leadgrid_engine::{
    validation, AutosaveConfig, CellKey, CommitOutcome, EditRefusal, GridController, GridData,
    GridView,
};
use runtime::Runtime;

#[derive(Parser)]
#[command(name = "leadgrid")]
#[command(about = "Spreadsheet-style lead grid with inline editing and autosave")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Lead API base URL (overrides `api.baseUrl` from settings)
    #[arg(long, global = true, env = "LEADGRID_API_BASE")]
    api_base: Option<String>,

    /// Settings file (default: ~/.config/leadgrid/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive grid
    #[command(after_help = "\
Keys:
  arrows / hjkl   move        Enter / e   edit cell
  Esc             cancel      u           undo last edit
  Tab             save, next  q           quit

Edits save 600ms after the last keystroke (autosave.debounceMs).")]
    Grid {
        /// Page of leads to load
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,

        /// Leads per page (default: `grid.pageSize`)
        #[arg(long)]
        page_size: Option<u32>,

        /// Write logs here instead of the default log file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Print one page of leads as a plain table
    Show {
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,

        /// Stop after this many leads (0 = all)
        #[arg(long, default_value_t = 0)]
        max_rows: usize,
    },

    /// Edit one cell and wait for the save
    #[command(after_help = "\
Examples:
  leadgrid set 101 email ada@example.com
  leadgrid set 101 phone ''            # clear the field

The cell goes through the same checks as the grid: locked, integration-sourced
and read-only cells are refused and email/phone values are validated first.")]
    Set {
        /// Lead id
        lead: String,

        /// Field key
        field: String,

        /// New value (empty clears the field)
        value: String,

        /// Page the lead is on
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Check a value against a field's format rules without sending anything
    Validate {
        /// Field key (rules apply to keys containing `email` or `phone`)
        field: String,

        value: String,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  leadgrid-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  leadgrid-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Grid { page, page_size, log_file } => {
            cmd_grid(cli.config, cli.api_base, page, page_size, log_file)
        }
        Commands::Show { page, page_size, max_rows } => {
            init_logging(None);
            cmd_show(cli.config, cli.api_base, page, page_size, max_rows)
        }
        Commands::Set { lead, field, value, page, page_size } => {
            init_logging(None);
            cmd_set(cli.config, cli.api_base, lead, field, value, page, page_size)
        }
        Commands::Validate { field, value } => cmd_validate(&field, &value),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Initialize logging. Filter comes from `LEADGRID_LOG` (default `warn`).
/// The interactive grid owns the terminal, so it logs to a file.
fn init_logging(file: Option<PathBuf>) {
    let env = env_logger::Env::default().filter_or("LEADGRID_LOG", "warn");
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = file {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                builder.target(env_logger::Target::Pipe(Box::new(f)));
            }
            Err(e) => {
                // No stderr while the grid is up; drop logs rather than corrupt the screen
                eprintln!("warning: cannot open log file {}: {}", path.display(), e);
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }

    let _ = builder.try_init();
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(err: ConfigError) -> Self {
        Self::new(EXIT_CONFIG, err.to_string())
            .with_hint("fix the file or remove it to regenerate defaults")
    }

    /// Create error from a failed grid load.
    pub fn load(err: ClientError, api_base: &str) -> Self {
        let hint = match &err {
            ClientError::Network(_) => Some(format!(
                "is the lead API running at {}? (set --api-base or LEADGRID_API_BASE)",
                api_base
            )),
            ClientError::Http(404, _) => {
                Some("check api.baseUrl; expected /api/fields and /api/leads".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_LOAD, message: format!("failed to load leads: {}", err), hint }
    }

    pub fn refused(key: &CellKey, refusal: EditRefusal) -> Self {
        let hint = match refusal {
            EditRefusal::UnknownLead => Some("the lead may be on another page; try --page".to_string()),
            EditRefusal::IntegrationSource => {
                Some("change the value in the integration it syncs from".to_string())
            }
            _ => None,
        };
        Self {
            code: refusal_exit_code(&refusal),
            message: format!("cannot edit {}: {}", key, refusal),
            hint,
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared setup
// ============================================================================

/// An explicit `--config` must load. The default location falls back to
/// defaults and returns the reason so it can be logged once logging is up.
fn load_settings(path: Option<PathBuf>) -> Result<(Settings, Option<ConfigError>), CliError> {
    match path {
        Some(path) => Settings::load_from(&path)
            .map(|settings| (settings, None))
            .map_err(CliError::config),
        None => Ok(Settings::load_or_default(&Settings::config_path())),
    }
}

struct Session {
    settings: Settings,
    api: ApiClient,
    fallback: Option<ConfigError>,
}

impl Session {
    fn open(config: Option<PathBuf>, api_base: Option<String>) -> Result<Self, CliError> {
        let (mut settings, fallback) = load_settings(config)?;
        if let Some(base) = api_base {
            settings.api_base_url = base;
        }
        let api = ApiClient::new(&settings.api_base_url, settings.timeout())
            .map_err(|e| CliError::general(e.to_string()))?;
        Ok(Self { settings, api, fallback })
    }

    /// Call after `init_logging`.
    fn warn_fallback(&self) {
        if let Some(e) = &self.fallback {
            log::warn!("{}; using default settings", e);
        }
    }

    fn load(&self, page: u32, page_size: Option<u32>) -> Result<GridData, CliError> {
        if page == 0 {
            return Err(CliError::args("--page starts at 1"));
        }
        let page_size = page_size.unwrap_or(self.settings.page_size);
        if page_size == 0 {
            return Err(CliError::args("--page-size must be at least 1"));
        }
        self.api
            .load(page, page_size)
            .map_err(|e| CliError::load(e, self.api.api_base()))
    }

    fn controller(&self, data: GridData) -> GridController {
        GridController::new(data, AutosaveConfig::with_debounce(self.settings.debounce()))
    }
}

// ============================================================================
// grid
// ============================================================================

fn cmd_grid(
    config: Option<PathBuf>,
    api_base: Option<String>,
    page: u32,
    page_size: Option<u32>,
    log_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let session = Session::open(config, api_base)?;
    init_logging(Some(log_file.unwrap_or_else(|| session.settings.log_path())));
    session.warn_fallback();

    let data = session.load(page, page_size)?;
    let grid = session.controller(data);
    let title = format!("{} (page {})", session.api.api_base(), page);
    let runtime = Runtime::start(grid, session.api).map_err(CliError::general)?;

    tui::run(runtime, title).map_err(CliError::general)
}

// ============================================================================
// show
// ============================================================================

fn cmd_show(
    config: Option<PathBuf>,
    api_base: Option<String>,
    page: u32,
    page_size: Option<u32>,
    max_rows: usize,
) -> Result<(), CliError> {
    let session = Session::open(config, api_base)?;
    session.warn_fallback();
    let data = session.load(page, page_size)?;
    let grid = session.controller(data);
    tui::print_plain(&GridView::build(&grid), max_rows).map_err(CliError::general)
}

// ============================================================================
// set
// ============================================================================

fn cmd_set(
    config: Option<PathBuf>,
    api_base: Option<String>,
    lead: String,
    field: String,
    value: String,
    page: u32,
    page_size: Option<u32>,
) -> Result<(), CliError> {
    let session = Session::open(config, api_base)?;
    session.warn_fallback();
    let data = session.load(page, page_size)?;
    let wait = session.settings.timeout() + Duration::from_secs(1);
    let grid = session.controller(data);
    let mut runtime = Runtime::start(grid, session.api).map_err(CliError::general)?;

    let key = CellKey::new(lead, field);
    runtime
        .dispatch(|g| g.start_edit(key.clone()))
        .map_err(|refusal| CliError::refused(&key, refusal))?;

    runtime.dispatch(|g| g.update_buffer(value));
    if let Some(message) = runtime.grid().session().and_then(|s| s.validation_error()) {
        return Err(CliError::new(EXIT_VALIDATION, format!("{}: {}", key, message)));
    }

    match runtime.dispatch(|g| g.confirm()) {
        CommitOutcome::Unchanged => {
            println!("{}: unchanged", key);
            return Ok(());
        }
        CommitOutcome::Sent(id) => log::debug!("{} sent as {}", key, id),
        outcome => {
            return Err(CliError::general(format!("{}: not saved ({:?})", key, outcome)));
        }
    }

    if !runtime.wait_for_writes(wait) {
        return Err(CliError::new(
            EXIT_SAVE_TIMEOUT,
            format!("{}: save did not finish within {}s", key, wait.as_secs()),
        )
        .with_hint("raise api.timeoutSecs in settings"));
    }

    if let Some(err) = runtime.grid().save_state(&key).error {
        return Err(CliError::new(EXIT_SAVE_FAILED, format!("{}: {}", key, err)));
    }
    println!("{}: saved", key);
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(field: &str, value: &str) -> Result<(), CliError> {
    match validation::validate(field, value).into_error() {
        None => {
            println!("ok");
            Ok(())
        }
        Some(message) => Err(CliError::new(EXIT_VALIDATION, message)),
    }
}
