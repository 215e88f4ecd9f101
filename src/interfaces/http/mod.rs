//! HTTP interface
//!
//! - `common`: request extractors shared by the form pages
//! - `middleware`: session cookie handling and the admin gate
//! - `modules`: page and operational handlers
//! - `views`: server-rendered HTML
//! - `router`: route table and shared state

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;
pub mod views;

pub use router::{create_router, AppState};
