//! Command-line host for the Navigo grid.
//!
//! # Responsibility
//! - Wire config, logging, SQLite persistence and the grid store together.
//! - Expose the store operations as subcommands.
//! - Run the daily reset loop in `run` mode.

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use navigo_core::db::open_db;
use navigo_core::{
    default_log_level, init_logging, AppConfig, DailyResetScheduler, GridStateStore, GridStorage,
    KeyValueStore, SqliteKeyValueStore,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

type CliResult<T> = Result<T, Box<dyn Error>>;

const APP_DIR: &str = "navigo";
const CONFIG_FILE: &str = "config.json";
const DB_FILE: &str = "navigo.sqlite3";

#[derive(Parser, Debug)]
#[command(name = "navigo", version, about = "Track which cells of a grid are clean")]
struct Cli {
    /// Config file (default: <data dir>/navigo/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database, overrides `database_path` from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the grid
    Show,
    /// Toggle cleanliness of one active cell
    Clean(CellArgs),
    /// Toggle cells in or out of the layout and commit the result
    Layout(LayoutArgs),
    /// Change grid dimensions (clamped to 1..=50)
    Resize(ResizeArgs),
    /// Mark every active cell dirty
    Reset,
    /// Write the grid as JSON to a file or stdout
    Export(ExportArgs),
    /// Replace the grid with a JSON export
    Import(ImportArgs),
    /// Stay in the foreground and reset cleanliness every day
    Run,
}

#[derive(Args, Debug)]
struct CellArgs {
    row: usize,
    col: usize,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Row/column pairs: `<row> <col> [<row> <col> ...]`
    #[arg(required = true, num_args = 2..)]
    coords: Vec<usize>,
}

#[derive(Args, Debug)]
struct ResizeArgs {
    #[arg(allow_negative_numbers = true)]
    rows: i64,
    #[arg(allow_negative_numbers = true)]
    cols: i64,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Output file; stdout when omitted
    path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    path: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let app_dir = app_dir();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| app_dir.join(CONFIG_FILE));
    let config = AppConfig::load_or_default(&config_path)?;

    let level = config
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| app_dir.join("logs"));
    if let Err(err) = init_logging(&level, &log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| app_dir.join(DB_FILE));
    let conn = open_db(&db_path)?;
    let kv = SqliteKeyValueStore::try_new(&conn)?;
    let storage = GridStorage::with_prefix(kv, config.storage_prefix.trim());
    let mut store = GridStateStore::open(storage);

    match cli.command {
        Commands::Show => command_show(&store),
        Commands::Clean(args) => command_clean(&mut store, args),
        Commands::Layout(args) => command_layout(&mut store, args),
        Commands::Resize(args) => command_resize(&mut store, args),
        Commands::Reset => {
            store.reset_all_cleanliness();
            finish(&store)
        }
        Commands::Export(args) => command_export(&store, args),
        Commands::Import(args) => command_import(&mut store, &args.path),
        Commands::Run => command_run(&mut store, &config),
    }
}

fn app_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn command_show<S: KeyValueStore>(store: &GridStateStore<S>) -> CliResult<()> {
    if !store.storage().has_saved_grid()? {
        println!("no saved grid yet, showing defaults");
    }
    print_grid(store);
    Ok(())
}

fn command_clean<S: KeyValueStore>(
    store: &mut GridStateStore<S>,
    args: CellArgs,
) -> CliResult<()> {
    match store.toggle_cleanliness(args.row, args.col)? {
        Some(true) => println!("({}, {}) is now clean", args.row, args.col),
        Some(false) => println!("({}, {}) is now dirty", args.row, args.col),
        None => println!("({}, {}) is not part of the layout", args.row, args.col),
    }
    finish(store)
}

fn command_layout<S: KeyValueStore>(
    store: &mut GridStateStore<S>,
    args: LayoutArgs,
) -> CliResult<()> {
    if args.coords.len() % 2 != 0 {
        return Err("layout expects row/column pairs".into());
    }
    for pair in args.coords.chunks_exact(2) {
        if let Err(err) = store.toggle_layout(pair[0], pair[1]) {
            store.discard_layout_edits();
            return Err(err.into());
        }
    }
    store.persist_all();
    finish(store)
}

/// Resizes and commits both layers, so cells dropped by a shrink stay gone.
fn command_resize<S: KeyValueStore>(
    store: &mut GridStateStore<S>,
    args: ResizeArgs,
) -> CliResult<()> {
    if store.resize(args.rows, args.cols) {
        store.persist_all();
    } else {
        println!("grid already {}x{}", store.rows(), store.cols());
    }
    finish(store)
}

fn command_export<S: KeyValueStore>(
    store: &GridStateStore<S>,
    args: ExportArgs,
) -> CliResult<()> {
    let payload = store.export_json()?;
    match args.path {
        Some(path) => {
            std::fs::write(&path, payload)?;
            println!(
                "exported {}x{} grid to {}",
                store.rows(),
                store.cols(),
                path.display()
            );
        }
        None => println!("{payload}"),
    }
    Ok(())
}

fn command_import<S: KeyValueStore>(
    store: &mut GridStateStore<S>,
    path: &Path,
) -> CliResult<()> {
    let raw = std::fs::read_to_string(path)?;
    store.import_json(&raw)?;
    finish(store)
}

fn command_run<S: KeyValueStore>(
    store: &mut GridStateStore<S>,
    config: &AppConfig,
) -> CliResult<()> {
    let (fired, resets) = mpsc::channel::<()>();
    let mut scheduler = DailyResetScheduler::with_reset_time(config.reset_time()?);
    scheduler.start(move || {
        // receiver lives as long as the loop below
        let _ = fired.send(());
    })?;

    let next = scheduler.next_delay()?;
    println!(
        "waiting for daily reset at {} (in {} min)",
        scheduler.reset_at().format("%H:%M"),
        next.as_secs() / 60
    );
    info!("event=cli_run module=cli status=start");

    for () in resets {
        apply_daily_reset(store);
        println!(
            "reset: {}/{} active cells clean",
            store.clean_count(),
            store.active_count()
        );
        if store.persistence_degraded() {
            warn!("event=cli_run module=cli status=degraded");
        }
    }
    Ok(())
}

/// Resets against the persisted grid; other `navigo` invocations may have
/// changed it since the daemon started.
fn apply_daily_reset<S: KeyValueStore>(store: &mut GridStateStore<S>) {
    store.reload();
    store.reset_all_cleanliness();
}

/// Prints the grid and flags unsaved state.
fn finish<S: KeyValueStore>(store: &GridStateStore<S>) -> CliResult<()> {
    print_grid(store);
    if store.persistence_degraded() {
        return Err("changes were applied but could not be saved".into());
    }
    Ok(())
}

fn print_grid<S: KeyValueStore>(store: &GridStateStore<S>) {
    let layout = store.layout();
    let cleanliness = store.cleanliness();
    for row in 0..store.rows() {
        let line: String = (0..store.cols())
            .map(|col| match (layout.get(row, col), cleanliness.get(row, col)) {
                (Ok(false), _) => ' ',
                (Ok(true), Ok(true)) => 'o',
                _ => '.',
            })
            .collect();
        println!("{line}");
    }
    println!(
        "{}x{}  clean {}/{}",
        store.rows(),
        store.cols(),
        store.clean_count(),
        store.active_count()
    );
}

#[cfg(test)]
mod tests {
    use super::{apply_daily_reset, command_layout, command_resize, LayoutArgs, ResizeArgs};
    use navigo_core::db::open_db;
    use navigo_core::{GridStateStore, GridStorage, MemoryKeyValueStore, SqliteKeyValueStore};

    fn open(backend: &MemoryKeyValueStore) -> GridStateStore<&MemoryKeyValueStore> {
        GridStateStore::open(GridStorage::new(backend))
    }

    #[test]
    fn shrink_then_grow_across_invocations_keeps_dropped_cells_gone() {
        let backend = MemoryKeyValueStore::new();
        {
            let mut store = open(&backend);
            store.toggle_cleanliness(10, 10).unwrap();
            command_layout(&mut store, LayoutArgs { coords: vec![12, 12] }).unwrap();
        }
        command_resize(&mut open(&backend), ResizeArgs { rows: 5, cols: 5 }).unwrap();
        command_resize(&mut open(&backend), ResizeArgs { rows: 20, cols: 20 }).unwrap();

        let store = open(&backend);
        assert!(!store.is_clean(10, 10).unwrap());
        assert!(store.is_active(12, 12).unwrap());
    }

    #[test]
    fn unchanged_resize_is_accepted() {
        let backend = MemoryKeyValueStore::new();
        command_resize(&mut open(&backend), ResizeArgs { rows: 20, cols: 20 }).unwrap();
        command_resize(&mut open(&backend), ResizeArgs { rows: 99, cols: -3 }).unwrap();

        let store = open(&backend);
        assert_eq!((store.rows(), store.cols()), (50, 1));
    }

    #[test]
    fn daily_reset_respects_edits_made_after_daemon_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navigo.sqlite3");
        let daemon_conn = open_db(&path).unwrap();
        let editor_conn = open_db(&path).unwrap();
        let daemon_kv = SqliteKeyValueStore::try_new(&daemon_conn).unwrap();
        let editor_kv = SqliteKeyValueStore::try_new(&editor_conn).unwrap();

        let mut daemon = GridStateStore::open(GridStorage::new(daemon_kv));
        {
            let mut editor = GridStateStore::open(GridStorage::new(&editor_kv));
            editor.toggle_cleanliness(3, 3).unwrap();
            editor.toggle_cleanliness(4, 4).unwrap();
            command_layout(&mut editor, LayoutArgs { coords: vec![3, 3] }).unwrap();
        }

        apply_daily_reset(&mut daemon);

        let store = GridStateStore::open(GridStorage::new(&editor_kv));
        assert!(!store.is_active(3, 3).unwrap());
        assert!(store.is_clean(3, 3).unwrap());
        assert!(!store.is_clean(4, 4).unwrap());
    }
}
