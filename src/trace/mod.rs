//! Trace identity and dump line classification.
//!
//! A trace is known by the application that produced it and the graphics API
//! it captured. Everything else about it (a friendly name, a wiki link) is
//! metadata that travels with the identity and is replaced on re-import.

pub mod api;
pub mod parse;

pub use api::{ApiVariant, detect_api};
pub use parse::{LineRecord, classify_line};

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Store key of a trace: one entry per application and API variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceKey {
    pub application: String,
    pub api: ApiVariant,
}

impl std::fmt::Display for TraceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.application, self.api)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceIdentity {
    /// Binary name of the captured application
    pub application: String,
    pub api: ApiVariant,
    pub display_name: Option<String>,
    pub link: Option<String>,
}

impl TraceIdentity {
    pub fn new(application: impl Into<String>, api: ApiVariant) -> Self {
        Self {
            application: application.into(),
            api,
            display_name: None,
            link: None,
        }
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    pub fn with_link(mut self, link: Option<String>) -> Self {
        self.link = link;
        self
    }

    pub fn key(&self) -> TraceKey {
        TraceKey {
            application: self.application.clone(),
            api: self.api.clone(),
        }
    }

    /// The friendly name if one was given, otherwise the binary name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.application)
    }
}

/// Application name for a trace file: its file name up to the first dot.
///
/// `game.exe.trace` names `game`. A name starting with a dot keeps the
/// whole file name.
pub fn application_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    }
}
