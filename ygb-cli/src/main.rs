mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use commands::Command;
use ygb_core::{Config, SaveStore};

const USAGE: &str = "\
usage: ygb [-v] [--db <path>] <command>

commands:
  list [limit]          saves, most recently accessed first
  inspect <file>        print a save file as JSON
  import <file>         add a save file to the store
  export <id> [dir]     write a stored save to a file
  delete <id>           remove a stored save";

fn init_logging(verbose: bool) {
    use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    if let Err(e) = TermLogger::init(
        log_level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("logger unavailable: {}", e);
    }
    log::debug!("ygb starting (log level: {:?})", log_level);
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let db_arg = args
        .iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let mut positional = Vec::new();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
        } else if arg == "--db" {
            skip_next = true;
        } else if !arg.starts_with('-') {
            positional.push(arg.as_str());
        }
    }

    let command = match Command::parse(&positional) {
        Ok(command) => command,
        Err(msg) => {
            eprintln!("{}\n\n{}", msg, USAGE);
            return ExitCode::from(2);
        }
    };

    // `inspect` reads a file only; no store needed.
    if let Command::Inspect(path) = &command {
        return report(commands::inspect(path));
    }

    let Some(db_path) = db_arg.or_else(|| Config::load().database_path()) else {
        eprintln!("no database path: pass --db <path>");
        return ExitCode::FAILURE;
    };
    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create {}: {}", parent.display(), e);
            return ExitCode::FAILURE;
        }
    }
    let store = match SaveStore::open(&db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open {}: {}", db_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    report(commands::run(&store, command))
}

fn report(result: Result<String, String>) -> ExitCode {
    match result {
        Ok(out) => {
            if !out.is_empty() {
                println!("{}", out);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
