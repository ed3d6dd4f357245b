use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use nbrestore_project::{
    DisposableRegistry, DocumentLocation, EditorError, EditorEvents, EditorListener,
    EditorProvider, FileMemento, MementoStore, Subscription, TrackedDocuments, TrackerOptions,
    ViewTracker, WorkspaceId, MEMENTO_KEY,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "nbrestore-cli",
    about = "Inspect and maintain the notebook editors remembered per workspace",
    author,
    version
)]
struct Cli {
    /// 工作區狀態檔所在目錄；預設為目前目錄下的 `.nbrestore`。 / Directory holding workspace mementos (defaults to `.nbrestore` in the current directory).
    #[arg(long, global = true, value_name = "PATH")]
    state_dir: Option<PathBuf>,
    /// 要操作的工作區代號。 / Workspace whose memento is used.
    #[arg(long, global = true, value_name = "ID", default_value = "default")]
    workspace: String,
    /// 儲存追蹤清單的鍵名。 / Memento key holding the tracked list.
    #[arg(long, global = true, value_name = "KEY", default_value = MEMENTO_KEY)]
    key: String,
    /// 提高記錄詳細程度（-v debug，-vv trace），會覆蓋 `RUST_LOG`。 / Increase log verbosity (-v debug, -vv trace). Overrides `RUST_LOG`.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 逐行列出追蹤中的筆記本。 / Print the tracked notebook identifiers, one per line.
    List,
    /// 將筆記本記錄為已開啟。 / Record notebooks as open.
    Track {
        #[arg(required = true, value_name = "DOCUMENT")]
        documents: Vec<String>,
    },
    /// 將筆記本記錄為已關閉。 / Record notebooks as closed.
    Untrack {
        #[arg(required = true, value_name = "DOCUMENT")]
        documents: Vec<String>,
    },
    /// 清除所有追蹤紀錄。 / Forget every tracked notebook.
    Clear,
    /// 列出已有狀態檔的工作區。 / List workspaces that have stored state.
    Workspaces,
    /// 清空追蹤清單並列出將重新開啟的筆記本。 / Drain the tracked list, printing each notebook that would be reopened.
    Restore,
}

/// Provider standing in for a host editor: "opening" prints the location.
/// Local notebooks that no longer exist are reported as not found.
#[derive(Default)]
struct PrintingProvider {
    events: EditorEvents,
}

impl EditorProvider for PrintingProvider {
    fn on_did_open_editor(&self, listener: EditorListener) -> Subscription {
        self.events.subscribe_opened(listener)
    }

    fn on_did_close_editor(&self, listener: EditorListener) -> Subscription {
        self.events.subscribe_closed(listener)
    }

    fn open(&self, location: &DocumentLocation) -> Result<(), EditorError> {
        if let Some(path) = location.to_file_path() {
            if !path.exists() {
                return Err(EditorError::NotFound(location.clone()));
            }
        }
        println!("open {location}");
        Ok(())
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = MementoStore::new(resolve_state_dir(cli.state_dir)?);
    if let Commands::Workspaces = cli.command {
        for id in store.list().context("list workspaces")? {
            println!("{id}");
        }
        return Ok(());
    }

    let workspace = WorkspaceId::from_string(&cli.workspace);
    let memento = Arc::new(
        store
            .for_workspace(&workspace)
            .with_context(|| format!("open state for workspace `{workspace}`"))?,
    );
    debug!(workspace = %workspace, root = %store.root().display(), "workspace state opened");
    let options = TrackerOptions {
        memento_key: cli.key,
    };

    match cli.command {
        Commands::List => execute_list(&documents(memento, &options)),
        Commands::Track { documents: inputs } => {
            execute_track(&documents(memento, &options), &inputs)
        }
        Commands::Untrack { documents: inputs } => {
            execute_untrack(&documents(memento, &options), &inputs)
        }
        Commands::Clear => documents(memento, &options)
            .clear()
            .context("clear tracked notebooks"),
        Commands::Restore => execute_restore(memento, options),
        Commands::Workspaces => Ok(()),
    }
}

fn documents(memento: Arc<FileMemento>, options: &TrackerOptions) -> TrackedDocuments {
    TrackedDocuments::new(memento, options.memento_key.as_str())
}

fn execute_list(documents: &TrackedDocuments) -> Result<()> {
    for identifier in documents.list() {
        println!("{identifier}");
    }
    Ok(())
}

fn execute_track(documents: &TrackedDocuments, inputs: &[String]) -> Result<()> {
    for input in inputs {
        let identifier = canonical_identifier(input)?;
        if documents
            .insert(&identifier)
            .with_context(|| format!("track `{identifier}`"))?
        {
            println!("tracked {identifier}");
        } else {
            println!("already tracked {identifier}");
        }
    }
    Ok(())
}

fn execute_untrack(documents: &TrackedDocuments, inputs: &[String]) -> Result<()> {
    for input in inputs {
        let identifier = canonical_identifier(input)?;
        if documents
            .remove(&identifier)
            .with_context(|| format!("untrack `{identifier}`"))?
        {
            println!("untracked {identifier}");
        } else {
            println!("not tracked {identifier}");
        }
    }
    Ok(())
}

fn execute_restore(memento: Arc<FileMemento>, options: TrackerOptions) -> Result<()> {
    let provider = Arc::new(PrintingProvider::default());
    let mut disposables = DisposableRegistry::new();
    let tracker = ViewTracker::with_options(provider, memento, &mut disposables, options);
    let report = tracker.activate();
    for identifier in &report.skipped {
        eprintln!("skipped malformed entry {identifier:?}");
    }
    for (location, reason) in &report.failed {
        eprintln!("failed to open {location}: {reason}");
    }
    disposables.dispose();
    Ok(())
}

fn canonical_identifier(input: &str) -> Result<String> {
    DocumentLocation::parse(input)
        .map(|location| location.to_string())
        .map_err(|err| anyhow!("invalid document `{input}`: {err}"))
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve_state_dir(state_dir: Option<PathBuf>) -> Result<PathBuf> {
    let current = || std::env::current_dir().context("determine current directory");
    match state_dir {
        Some(path) if path.is_absolute() => Ok(path),
        Some(path) => Ok(current()?.join(path)),
        None => Ok(current()?.join(".nbrestore")),
    }
}
