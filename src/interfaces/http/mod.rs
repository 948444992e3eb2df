//! HTTP REST API interfaces
//!
//! - `common`: response envelope and the validated JSON extractor
//! - `modules`: request handlers per resource
//! - `router`: API router

pub mod common;
pub mod modules;
pub mod router;

pub use router::{create_api_router, ApiState};
