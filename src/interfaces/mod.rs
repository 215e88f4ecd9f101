//! Interfaces layer - how the outside world reaches the application

pub mod http;
