// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment reports what went wrong; this module turns each report into a
//! [`ConfigError`] that miette can render with the offending line of the
//! TOML file and, for typos, the closest valid key.

#![allow(unused_assignments)] // emitted by the miette Diagnostic derive

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A TOML file that took part in a load, kept for span lookups.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Reads `path`, or `None` when it does not exist or is unreadable.
    pub fn read(path: &std::path::Path) -> Option<Self> {
        std::fs::read_to_string(path)
            .ok()
            .map(|content| Self::new(path.display().to_string(), content))
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", section_label(.section))]
    #[diagnostic(code(hostdesk::config::unknown_key), help("{}", choices_help(suggestion.as_deref(), valid)))]
    UnknownKey {
        key: String,
        section: String,
        suggestion: Option<String>,
        valid: String,
        #[label("unknown key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{value}` is not a valid value for `{key}`")]
    #[diagnostic(code(hostdesk::config::unknown_variant), help("{}", choices_help(suggestion.as_deref(), valid)))]
    UnknownVariant {
        key: String,
        value: String,
        suggestion: Option<String>,
        valid: String,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(hostdesk::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(hostdesk::config::missing_key), help("set `{key}` in hostdesk.toml or through HOSTDESK_* variables"))]
    MissingKey { key: String },

    /// A value that parsed but does not make sense.
    #[error("{message}")]
    #[diagnostic(code(hostdesk::config::validation))]
    Validation { message: String },

    /// Two `[[channels]]` entries claim the same receiving number.
    #[error("duplicate channel `{phone_number_id}`")]
    #[diagnostic(
        code(hostdesk::config::duplicate_channel),
        help("each phone_number_id may be mapped to exactly one tenant")
    )]
    DuplicateChannel { phone_number_id: String },

    #[error("configuration could not be loaded: {0}")]
    #[diagnostic(code(hostdesk::config::unreadable))]
    Unreadable(String),
}

impl ConfigError {
    /// Splits a figment error into one diagnostic per underlying failure.
    pub fn from_figment(err: figment::Error, sources: &[SourceFile]) -> Vec<Self> {
        err.into_iter()
            .map(|error| {
                let section = error.path.join(".");
                match error.kind {
                    Kind::UnknownField(ref key, valid) => {
                        // figment's path ends with the unknown key itself.
                        let table = match error.path.split_last() {
                            Some((last, parent)) if last == key => parent,
                            _ => error.path.as_slice(),
                        };
                        let section = table.join(".");
                        let located = error
                            .metadata
                            .as_ref()
                            .and_then(|m| m.source.as_ref())
                            .and_then(|s| s.file_path())
                            .and_then(|path| {
                                let name = path.display().to_string();
                                sources.iter().find(|f| f.name == name)
                            })
                            .or_else(|| match sources {
                                [only] => Some(only),
                                _ => None,
                            })
                            .and_then(|file| {
                                locate_key(&file.content, table, key).map(|offset| {
                                    (
                                        SourceSpan::new(offset.into(), key.len()),
                                        NamedSource::new(&file.name, file.content.clone()),
                                    )
                                })
                            });
                        let (span, src) = located.unzip();
                        Self::UnknownKey {
                            key: key.clone(),
                            section,
                            suggestion: closest(key, valid),
                            valid: valid.join(", "),
                            span,
                            src,
                        }
                    }
                    Kind::UnknownVariant(value, valid) => Self::UnknownVariant {
                        key: section,
                        suggestion: closest(&value, valid),
                        value,
                        valid: valid.join(", "),
                    },
                    Kind::InvalidType(found, expected) => Self::InvalidType {
                        key: section,
                        found: found.to_string(),
                        expected,
                    },
                    Kind::MissingField(field) => {
                        let key = match error.path.last() {
                            _ if section.is_empty() => field.into_owned(),
                            Some(last) if *last == field => section,
                            _ => format!("{section}.{field}"),
                        };
                        Self::MissingKey { key }
                    }
                    _ => Self::Unreadable(error.to_string()),
                }
            })
            .collect()
    }
}

fn section_label(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn choices_help(suggestion: Option<&str>, valid: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? (one of: {valid})"),
        None => format!("one of: {valid}"),
    }
}

/// The valid choice closest to `input`, if any is close enough.
pub fn closest(input: &str, valid: &[&str]) -> Option<String> {
    valid
        .iter()
        .map(|candidate| (strsim::jaro_winkler(input, candidate), *candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Byte offset of `key = ...` inside the table named by `section`.
///
/// Tracks table headers line by line, so `[queues.media]` and array
/// tables like `[[channels]]` resolve as well as top-level keys.
pub fn locate_key(content: &str, section: &[String], key: &str) -> Option<usize> {
    let wanted = section.join(".");
    let mut table = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            table = trimmed
                .trim_end()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .trim()
                .to_string();
        } else if table == wanted
            && let Some(rest) = trimmed.strip_prefix(key)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Prints every error to stderr with miette's graphical renderer.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("{} configuration errors", errors.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn closest_queue_policy_key() {
        let valid = &["concurrency", "attempts", "backoff_ms", "poll_interval_ms"];
        assert_eq!(closest("concurency", valid).as_deref(), Some("concurrency"));
        assert_eq!(closest("zzzz", valid), None);
    }

    #[test]
    fn closest_prefers_best_score() {
        let valid = &["api_base_url", "api_version", "verify_token", "app_secret"];
        assert_eq!(closest("app_secert", valid).as_deref(), Some("app_secret"));
    }

    #[test]
    fn locates_key_in_plain_table() {
        let content = "[server]\nport = 1\n[media]\nstorge_dir = \"/x\"\n";
        let offset = locate_key(content, &path(&["media"]), "storge_dir").unwrap();
        assert_eq!(&content[offset..offset + 10], "storge_dir");
    }

    #[test]
    fn locates_key_in_nested_table_only() {
        let content = "[queues.incoming]\nconcurency = 1\n[queues.media]\n  concurency = 2\n";
        let offset = locate_key(content, &path(&["queues", "media"]), "concurency").unwrap();
        assert_eq!(&content[offset - 2..offset], "  ");
        assert!(offset > content.find("[queues.media]").unwrap());
    }

    #[test]
    fn locates_top_level_key_before_any_table() {
        let content = "stray = 1\n[server]\nstray = 2\n";
        assert_eq!(locate_key(content, &[], "stray"), Some(0));
    }

    #[test]
    fn prefix_of_longer_key_does_not_match() {
        let content = "[server]\nportal = 1\n";
        assert_eq!(locate_key(content, &path(&["server"]), "port"), None);
    }

    #[test]
    fn unknown_field_carries_suggestion_and_span() {
        let toml = "[bus]\nroom_capacty = 3\n";
        let err = crate::loader::load_config_from_str(toml).unwrap_err();
        let errors = ConfigError::from_figment(err, &[SourceFile::new("<inline>", toml)]);
        let found = errors.iter().any(|e| {
            matches!(
                e,
                ConfigError::UnknownKey { key, section, suggestion: Some(s), span: Some(_), .. }
                    if key == "room_capacty" && section == "bus" && s == "room_capacity"
            )
        });
        assert!(found, "{errors:?}");
    }

    #[test]
    fn unknown_nested_queue_key_points_at_its_table() {
        let toml = "[queues.incoming]\nconcurrency = 2\n[queues.media]\nconcurency = 2\n";
        let err = crate::loader::load_config_from_str(toml).unwrap_err();
        let errors = ConfigError::from_figment(err, &[SourceFile::new("<inline>", toml)]);
        let span = errors.iter().find_map(|e| match e {
            ConfigError::UnknownKey { section, span: Some(span), .. } if section == "queues.media" => Some(*span),
            _ => None,
        });
        let span = span.unwrap_or_else(|| panic!("{errors:?}"));
        assert_eq!(span.offset(), toml.rfind("concurency").unwrap());
        assert!(errors[0].to_string().contains("[queues.media]"));
    }
}
