use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use env_logger::{Builder, Env};
use independent_stash::clock::SystemClock;
use independent_stash::config::{ModConfig, OPEN_STASH_KEY};
use independent_stash::error::{Result, StashError};
use independent_stash::model::Snapshot;
use independent_stash::paths::StashPaths;
use independent_stash::persistence::{
    inventory_key, legacy_inventory_key, version_key, Persistence, FORMAT_VERSION,
};
use independent_stash::store::{FsBackend, KeyedFile, StorageBackend};
use std::path::{Path, PathBuf};
use std::rc::Rc;

mod args;
use args::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    let base = resolve_base_dir(cli.data_dir.clone())?;
    let paths = StashPaths::new(&base);

    match cli.command {
        Some(Commands::Paths) => handle_paths(&paths),
        Some(Commands::Show { items }) => handle_show(&paths, items),
        Some(Commands::Migrate) => handle_migrate(&base, &paths),
        Some(Commands::Config { init }) => handle_config(&paths, init),
        None => handle_show(&paths, false),
    }
}

fn resolve_base_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    let proj_dirs = ProjectDirs::from("com", "independent-stash", "independent-stash")
        .ok_or_else(|| StashError::Config("Could not determine data dir".into()))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

fn handle_paths(paths: &StashPaths) -> Result<()> {
    print_path("root", &paths.root);
    print_path("save", &paths.save_file);
    print_path("backup", &paths.backup_file);
    print_path("config", &paths.config_file);
    Ok(())
}

fn print_path(label: &str, path: &Path) {
    let marker = if path.exists() {
        "".normal()
    } else {
        " (missing)".dimmed()
    };
    println!("{:<8} {}{}", label.bold(), path.display(), marker);
}

fn handle_show(paths: &StashPaths, items: bool) -> Result<()> {
    let backend = FsBackend::new();
    if !backend.exists(&paths.save_file) {
        println!(
            "{}",
            format!("No stash file at {}", paths.save_file.display()).yellow()
        );
        return Ok(());
    }

    let file = KeyedFile::open(&backend, &paths.save_file)?;

    let version = match file.get::<u32>(&version_key()) {
        Some(Ok(v)) if v > FORMAT_VERSION => format!("{} (newer than {})", v, FORMAT_VERSION)
            .yellow()
            .to_string(),
        Some(Ok(v)) => v.to_string(),
        Some(Err(_)) => "unreadable".red().to_string(),
        None => "none".dimmed().to_string(),
    };
    println!("{:<10} {}", "version".bold(), version);

    let snapshot = match file.get::<Snapshot>(&inventory_key()) {
        Some(Ok(snapshot)) => Some(snapshot),
        Some(Err(e)) => {
            println!("{}", format!("Inventory unreadable: {}", e).red());
            None
        }
        None => {
            println!("{}", "No inventory saved yet".dimmed());
            None
        }
    };
    if let Some(snapshot) = &snapshot {
        println!("{:<10} {}", "capacity".bold(), snapshot.capacity);
        println!("{:<10} {}", "slots".bold(), snapshot.len());
        println!("{:<10} {}", "items".bold(), snapshot.item_count());
    }

    if file.contains(&legacy_inventory_key()) {
        println!(
            "{}",
            "Legacy inventory key present (run `stash migrate`)".yellow()
        );
    }
    let backup = if backend.exists(&paths.backup_file) {
        "present".green()
    } else {
        "none".dimmed()
    };
    println!("{:<10} {}", "backup".bold(), backup);

    if items {
        if let Some(snapshot) = &snapshot {
            for entry in &snapshot.entries {
                println!(
                    "{:>5}  {} x{}",
                    entry.slot.to_string().yellow(),
                    entry.item.type_id,
                    entry.item.count
                );
            }
        }
    }
    Ok(())
}

fn handle_migrate(base: &Path, paths: &StashPaths) -> Result<()> {
    let legacy = legacy_inventory_key();
    let had_legacy = has_key(&paths.save_file, &legacy)?;

    let mut persistence = Persistence::new(FsBackend::new(), Rc::new(SystemClock));
    persistence.initialize(base)?;
    let outcome = persistence.load()?;
    log::debug!("Load after initialize: {:?}", outcome);

    let still_legacy = has_key(&paths.save_file, &legacy)?;
    if had_legacy && !still_legacy {
        println!(
            "{}",
            format!("Migrated inventory to {}", inventory_key()).green()
        );
    } else if still_legacy {
        println!(
            "{}",
            "Legacy key left in place: a current inventory already exists".yellow()
        );
    } else {
        println!("{}", "Nothing to migrate".dimmed());
    }
    Ok(())
}

fn has_key(file: &Path, key: &str) -> Result<bool> {
    let backend = FsBackend::new();
    if !backend.exists(file) {
        return Ok(false);
    }
    Ok(KeyedFile::open(&backend, file)?.contains(key))
}

fn handle_config(paths: &StashPaths, init: bool) -> Result<()> {
    if init {
        if paths.config_file.exists() {
            println!(
                "{}",
                format!("Config already exists at {}", paths.config_file.display()).yellow()
            );
        } else {
            ModConfig::default().write_default(&paths.config_file)?;
            println!(
                "{}",
                format!("Wrote default config to {}", paths.config_file.display()).green()
            );
        }
        return Ok(());
    }

    let config = if paths.config_file.exists() {
        ModConfig::load(&paths.config_file)
    } else {
        println!("{}", "No config file; showing defaults".dimmed());
        ModConfig::default()
    };
    println!("{} = {}", OPEN_STASH_KEY, config.open_stash_key);
    Ok(())
}
