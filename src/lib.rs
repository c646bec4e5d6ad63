pub mod api;
pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod google;
pub mod identity;
pub mod server;
pub mod vending;
