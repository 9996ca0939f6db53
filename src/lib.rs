pub mod api;
pub mod clients;
pub mod config;
pub mod intake;
pub mod models;
pub mod utils;
pub mod worker;
