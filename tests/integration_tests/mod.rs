// The parse tests drive a shell-script mock of apitrace, so they only run on Unix.
#[cfg(unix)]
pub mod parse;

pub mod config;
pub mod help;
pub mod import;
pub mod search;
