pub mod app;
pub mod commands;
pub mod config;
pub mod gate;
pub mod terminal;
