pub mod connection;
pub mod registry;

pub use connection::{Connection, ConnectionStatus};
pub use registry::{SessionRegistry, SharedSessionRegistry};
