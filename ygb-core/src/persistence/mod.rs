//! Save snapshots: the portable `.ygb` file format and the SQLite record store.

pub mod dump;
pub mod schema;
pub mod store;

pub use dump::{decode, encode, file_name, read_file, write_to_dir, EXTENSION};
pub use store::SaveStore;
