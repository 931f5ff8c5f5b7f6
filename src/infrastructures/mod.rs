pub mod adapters;
pub mod bootstrap;
pub mod config;
