// Public API for integration tests and the server binary

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod scoring;
pub mod state;
pub mod store;
pub mod timer;
pub mod types;
