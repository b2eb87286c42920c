pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod event;
pub mod language;
pub mod lint;
pub mod prompt;
pub mod protocol;
pub mod session;
pub mod suggest;
pub mod transcript;
