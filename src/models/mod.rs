pub mod task;

pub use task::{Priority, Task, TaskDraft, TaskStatus, parse_deadline};
