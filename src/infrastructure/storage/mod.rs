//! Restore-state storage: last displayed value per entity

mod file;
mod memory;
mod traits;

pub use file::FileRestoreStore;
pub use memory::InMemoryRestoreStore;
pub use traits::RestoreStateStore;
