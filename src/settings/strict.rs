//! Unknown-key detection for the settings file.
//!
//! The file is deserialized into the all-optional settings layer through
//! `serde_ignored`; every key the layer does not consume is reported with the
//! file path and a best-effort line number.

use std::path::Path;

use confique::Config;
use serde::Deserialize;

use crate::error::SettingsError;

/// Reject any key in `content` that [`CharmSettings`](super::CharmSettings)
/// (or whichever `C` is given) does not define.
pub fn validate_unknown_keys<C: Config>(content: &str, path: &Path) -> Result<(), SettingsError>
where
    C::Layer: for<'de> Deserialize<'de>,
{
    let ignored = ignored_paths::<C>(content).map_err(|source| SettingsError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;

    let errors: Vec<SettingsError> = ignored
        .into_iter()
        .map(|key| SettingsError::UnknownKey {
            line: find_key_line(content, &key),
            path: path.to_path_buf(),
            key,
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SettingsError::UnknownKeys(errors))
    }
}

/// Dotted paths the settings layer left unconsumed, in file order.
fn ignored_paths<C: Config>(content: &str) -> Result<Vec<String>, toml::de::Error>
where
    C::Layer: for<'de> Deserialize<'de>,
{
    let mut paths = Vec::new();
    let _: C::Layer = serde_ignored::deserialize(toml::Deserializer::new(content), |p| {
        paths.push(p.to_string())
    })?;
    Ok(paths)
}

/// 1-indexed line of `dotted_key` in `content`, or 0 when it can't be found.
///
/// Tracks `[section]` headers so `gitea.typo` only matches inside `[gitea]`.
/// Quoted keys and inline tables are not handled.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let segments: Vec<&str> = dotted_key.split('.').collect();
    let Some((leaf, expected_section)) = segments.split_last() else {
        return 0;
    };

    let mut current_section: Vec<&str> = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') && !trimmed.starts_with("[[") {
            let header = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            current_section = header.split('.').map(str::trim).collect();
            continue;
        }

        if current_section == expected_section
            && let Some(after_key) = trimmed.strip_prefix(leaf)
            && after_key.trim_start().starts_with('=')
        {
            return i + 1;
        }
    }
    0
}
