//! Save-management commands. Each returns the text to print.

use std::path::{Path, PathBuf};

use ygb_core::persistence::dump;
use ygb_core::SaveStore;
use ygb_types::SaveRecord;

const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, PartialEq)]
pub enum Command {
    List(usize),
    Inspect(PathBuf),
    Import(PathBuf),
    Export { id: i64, dir: PathBuf },
    Delete(i64),
}

impl Command {
    pub fn parse(args: &[&str]) -> Result<Self, String> {
        match args {
            ["list"] => Ok(Command::List(DEFAULT_LIST_LIMIT)),
            ["list", limit] => limit
                .parse()
                .map(Command::List)
                .map_err(|_| format!("invalid limit `{}`", limit)),
            ["inspect", file] => Ok(Command::Inspect(PathBuf::from(file))),
            ["import", file] => Ok(Command::Import(PathBuf::from(file))),
            ["export", id] => Ok(Command::Export {
                id: parse_id(id)?,
                dir: PathBuf::from("."),
            }),
            ["export", id, dir] => Ok(Command::Export {
                id: parse_id(id)?,
                dir: PathBuf::from(dir),
            }),
            ["delete", id] => Ok(Command::Delete(parse_id(id)?)),
            [] => Err("missing command".to_string()),
            [other, ..] => Err(format!("unknown or malformed command `{}`", other)),
        }
    }
}

fn parse_id(s: &str) -> Result<i64, String> {
    s.parse().map_err(|_| format!("invalid save id `{}`", s))
}

pub fn run(store: &SaveStore, command: Command) -> Result<String, String> {
    match command {
        Command::List(limit) => list(store, limit),
        Command::Inspect(path) => inspect(&path),
        Command::Import(path) => import(store, &path),
        Command::Export { id, dir } => export(store, id, &dir),
        Command::Delete(id) => delete(store, id),
    }
}

fn list(store: &SaveStore, limit: usize) -> Result<String, String> {
    let records = store
        .recent(limit)
        .map_err(|e| format!("Failed to list saves: {}", e))?;
    if records.is_empty() {
        return Ok("no saves".to_string());
    }
    let lines: Vec<String> = records
        .iter()
        .map(|r| {
            format!(
                "{:>5}  {:<16}  {:<8}  {:>8}  {}",
                r.id.unwrap_or_default(),
                r.metadata.cart_title,
                r.state.name(),
                r.data.len(),
                dump::file_name(&r.metadata),
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

pub fn inspect(path: &Path) -> Result<String, String> {
    let record = dump::read_file(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    describe(&record)
}

fn describe(record: &SaveRecord) -> Result<String, String> {
    let mut value = serde_json::to_value(record).map_err(|e| e.to_string())?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("data_len".into(), record.data.len().into());
    }
    serde_json::to_string_pretty(&value).map_err(|e| e.to_string())
}

fn import(store: &SaveStore, path: &Path) -> Result<String, String> {
    let record = dump::read_file(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let id = store
        .put(&record)
        .map_err(|e| format!("Failed to store save: {}", e))?;
    log::info!("imported {} as {}", path.display(), id);
    Ok(format!("imported as {}", id))
}

fn export(store: &SaveStore, id: i64, dir: &Path) -> Result<String, String> {
    let record = store
        .get(id)
        .map_err(|e| format!("Failed to read save {}: {}", id, e))?
        .ok_or_else(|| format!("no save with id {}", id))?;
    let path = dump::write_to_dir(dir, &record).map_err(|e| format!("{}: {}", dir.display(), e))?;
    Ok(path.display().to_string())
}

fn delete(store: &SaveStore, id: i64) -> Result<String, String> {
    match store.delete(id) {
        Ok(true) => Ok(format!("deleted {}", id)),
        Ok(false) => Err(format!("no save with id {}", id)),
        Err(e) => Err(format!("Failed to delete save {}: {}", id, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ygb_types::{SaveMetadata, SessionState};

    fn sample() -> SaveRecord {
        SaveRecord {
            id: None,
            data: vec![7; 12],
            state: SessionState::Running,
            metadata: SaveMetadata {
                cart_title: "METROID".into(),
                created_at: Some(1_600_000_000_000),
                last_accessed: Some(1_709_211_909_000),
            },
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(&["list"]), Ok(Command::List(20)));
        assert_eq!(Command::parse(&["list", "5"]), Ok(Command::List(5)));
        assert_eq!(Command::parse(&["delete", "3"]), Ok(Command::Delete(3)));
        assert_eq!(
            Command::parse(&["export", "9", "out"]),
            Ok(Command::Export {
                id: 9,
                dir: PathBuf::from("out")
            })
        );
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&["delete", "x"]).is_err());
        assert!(Command::parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SaveStore::open_in_memory().unwrap();
        let id = store.put(&sample()).unwrap();

        let path = run(
            &store,
            Command::Export {
                id,
                dir: dir.path().to_path_buf(),
            },
        )
        .unwrap();
        assert!(path.ends_with("METROID-2024-02-29-13-05-09.ygb"));

        let out = run(&store, Command::Import(PathBuf::from(&path))).unwrap();
        assert!(out.starts_with("imported as "));
        assert_eq!(store.count().unwrap(), 2);

        let json = inspect(Path::new(&path)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["cart_title"], "METROID");
        assert_eq!(value["state"], "running");
        assert_eq!(value["data_len"], 12);
    }

    #[test]
    fn missing_ids_are_errors() {
        let store = SaveStore::open_in_memory().unwrap();
        assert!(run(&store, Command::Delete(42)).is_err());
        assert!(run(
            &store,
            Command::Export {
                id: 42,
                dir: PathBuf::from(".")
            }
        )
        .is_err());
        assert_eq!(run(&store, Command::List(5)).unwrap(), "no saves");
    }
}
