pub mod board;
pub mod constants;
pub mod engine;
pub mod error;
pub mod light;
pub mod lobby;
pub mod match_store;
pub mod objectives;
pub mod rng;
pub mod scoring;
pub mod server_protocol;
pub mod server_utils;
pub mod state_archive;
pub mod types;
