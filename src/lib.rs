// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod enrichment;
pub mod generator;
pub mod protocol;
pub mod session;
pub mod state;
pub mod text;
pub mod timers;
pub mod types;
pub mod validator;
pub mod ws;
