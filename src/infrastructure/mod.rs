//! Infrastructure layer - external concerns

pub mod storage;

pub use storage::{FileRestoreStore, InMemoryRestoreStore, RestoreStateStore};
