pub mod kv;
pub mod repository;

pub use kv::{KvStore, MemoryKvStore, SqliteKvStore};
pub use repository::{TASKS_KEY, TaskRepository};
