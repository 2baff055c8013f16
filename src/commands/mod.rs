pub mod config;
pub mod parse;
pub mod store;

pub use config::{handle_config_init, handle_config_show};
pub use parse::{ParseOptions, handle_parse};
pub use store::{
    SearchOptions, handle_import, handle_list, handle_remove, handle_search, handle_summary,
};
