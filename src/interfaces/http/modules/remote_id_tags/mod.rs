//! Remote id tag module: the editable value surface of each charge point

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
