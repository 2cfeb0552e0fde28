// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Hostdesk pipeline.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, and diagnostic
//! error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use hostdesk_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, SourceFile, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::HostdeskConfig;

fn finish(
    loaded: Result<HostdeskConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<SourceFile>,
) -> Result<HostdeskConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| ConfigError::from_figment(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Loads the standard file hierarchy plus `HOSTDESK_*` overrides and
/// validates the result. Every problem found is returned, not just the first.
pub fn load_and_validate() -> Result<HostdeskConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || {
        let local = std::env::current_dir()
            .map(|dir| dir.join("hostdesk.toml"))
            .unwrap_or_else(|_| "hostdesk.toml".into());
        let user = dirs::config_dir().map(|dir| dir.join("hostdesk/hostdesk.toml"));
        [Some(local), user, Some("/etc/hostdesk/hostdesk.toml".into())]
            .into_iter()
            .flatten()
            .filter_map(|path: std::path::PathBuf| SourceFile::read(&path))
            .collect()
    })
}

/// Same as [`load_and_validate`] but reads `path` instead of the hierarchy.
pub fn load_and_validate_path(path: &Path) -> Result<HostdeskConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        SourceFile::read(path).into_iter().collect()
    })
}

pub fn load_and_validate_str(toml_content: &str) -> Result<HostdeskConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![SourceFile::new("<inline>", toml_content)]
    })
}
