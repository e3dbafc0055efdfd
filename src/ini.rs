//! In-memory INI store in the dialect Gitea reads and writes.
//!
//! The dialect follows the `configparser` conventions Gitea's `app.ini` is
//! usually edited with:
//!
//! - `[section]` headers; `KEY = value` or `KEY: value` entries, split on the
//!   first delimiter, both sides trimmed. Keys keep their case.
//! - A bare `KEY` line is a valueless entry and is written back bare.
//! - Indented lines continue the previous value (joined with `\n`, written
//!   back as `\n\t`).
//! - Full-line comments (`#`, `;`) are dropped on read.
//! - The `DEFAULT` section always exists and is always written first. Any
//!   spelling of `default` addresses it.
//!
//! Sections and entries keep insertion order, so a load/save cycle without
//! mutations reproduces the same sections, keys and values.

use std::fmt;

use crate::error::{ConfigError, IniSyntaxError};

/// Name of the always-present leading section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// The literal marker line a persisted file must start with.
pub const DEFAULT_MARKER: &str = "[DEFAULT]";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<(String, Option<String>)>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

/// Ordered section → ordered key → value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniDocument {
    // Index 0 is always DEFAULT.
    sections: Vec<Section>,
}

impl Default for IniDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the case-insensitive `default` alias onto the real section name.
fn canonical(name: &str) -> &str {
    if name.eq_ignore_ascii_case(DEFAULT_SECTION) {
        DEFAULT_SECTION
    } else {
        name
    }
}

impl IniDocument {
    /// An empty document holding only the `DEFAULT` section.
    pub fn new() -> Self {
        Self {
            sections: vec![Section::new(DEFAULT_SECTION)],
        }
    }

    /// Parse INI text into a fresh document.
    pub fn parse(text: &str) -> Result<Self, IniSyntaxError> {
        let mut doc = Self::new();
        let mut current: Option<usize> = None;
        // (section index, entry index) of the entry a continuation line extends
        let mut last_entry: Option<(usize, usize)> = None;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                last_entry = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if raw.starts_with([' ', '\t'])
                && let Some((s, e)) = last_entry
            {
                let value = &mut doc.sections[s].entries[e].1;
                let joined = match value.take() {
                    Some(mut v) => {
                        v.push('\n');
                        v.push_str(trimmed);
                        v
                    }
                    None => trimmed.to_string(),
                };
                *value = Some(joined);
                continue;
            }

            if let Some(header) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                if header.is_empty() {
                    return Err(IniSyntaxError {
                        line: line_no,
                        reason: "empty section name".into(),
                    });
                }
                if header.eq_ignore_ascii_case(DEFAULT_SECTION) {
                    current = Some(0);
                } else if doc.index_of(header).is_some() {
                    return Err(IniSyntaxError {
                        line: line_no,
                        reason: format!("duplicate section '{header}'"),
                    });
                } else {
                    doc.sections.push(Section::new(header));
                    current = Some(doc.sections.len() - 1);
                }
                last_entry = None;
                continue;
            }

            let Some(section) = current else {
                return Err(IniSyntaxError {
                    line: line_no,
                    reason: "entry outside of any section".into(),
                });
            };

            let (key, value) = match trimmed.find(['=', ':']) {
                Some(idx) => (
                    trimmed[..idx].trim_end(),
                    Some(trimmed[idx + 1..].trim_start().to_string()),
                ),
                None => (trimmed, None),
            };
            if key.is_empty() {
                return Err(IniSyntaxError {
                    line: line_no,
                    reason: "entry without a key".into(),
                });
            }

            let entries = &mut doc.sections[section].entries;
            if entries.iter().any(|(k, _)| k == key) {
                return Err(IniSyntaxError {
                    line: line_no,
                    reason: format!("duplicate key '{key}'"),
                });
            }
            entries.push((key.to_string(), value));
            last_entry = Some((section, entries.len() - 1));
        }

        Ok(doc)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let name = canonical(name);
        self.sections.iter().position(|s| s.name == name)
    }

    fn section_mut(&mut self, name: &str) -> Result<&mut Section, ConfigError> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| ConfigError::SectionNotFound {
                section: name.to_string(),
            })?;
        Ok(&mut self.sections[idx])
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Create `name` (empty) unless it already exists.
    pub fn ensure_section(&mut self, name: &str) {
        if !self.has_section(name) {
            self.sections.push(Section::new(name));
        }
    }

    /// Set `key` in an existing section, replacing any previous value in place.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        let section = self.section_mut(section)?;
        match section.position(key) {
            Some(idx) => section.entries[idx].1 = Some(value.to_string()),
            None => section
                .entries
                .push((key.to_string(), Some(value.to_string()))),
        }
        Ok(())
    }

    /// Remove `key` from an existing section. Returns whether it was present.
    pub fn remove(&mut self, section: &str, key: &str) -> Result<bool, ConfigError> {
        let section = self.section_mut(section)?;
        match section.position(key) {
            Some(idx) => {
                section.entries.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Look up a value. Valueless entries read as `""`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let section = &self.sections[self.index_of(section)?];
        section
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    /// Names of all sections except `DEFAULT`, in file order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections[1..].iter().map(|s| s.name.as_str())
    }

    /// Keys of `section` in file order, or `None` if it does not exist.
    pub fn keys(&self, section: &str) -> Option<Vec<&str>> {
        let section = &self.sections[self.index_of(section)?];
        Some(section.entries.iter().map(|(k, _)| k.as_str()).collect())
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                match value {
                    Some(v) => writeln!(f, "{key} = {}", v.replace('\n', "\n\t"))?,
                    None => writeln!(f, "{key}")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
