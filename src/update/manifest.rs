//! Date-stamp rewriting of the versions manifest.
//!
//! The manifest is a JSON object with a `variables` object. Keys shaped like
//! `{kind}|...|datestamp` (e.g. `runtime|datestamp`, `sdk|4.8|datestamp`)
//! receive the resolved stamp for `kind`. Everything else is left as is.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::UpdateError;
use crate::update::options::{ImageKind, UpdateOptions};

const DATESTAMP_SUFFIX: &str = "datestamp";

/// One variable whose value changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatestampChange {
    pub variable: String,
    pub previous: Option<String>,
    pub updated: String,
}

fn variable_kind(key: &str) -> Option<ImageKind> {
    let mut segments = key.split('|');
    let prefix = segments.next()?;
    let last = segments.last()?;
    if last != DATESTAMP_SUFFIX {
        return None;
    }
    ImageKind::from_variable_prefix(prefix)
}

/// Applies the stamps in `options` to a parsed manifest.
pub fn apply_datestamps(
    manifest: &mut Value,
    options: &UpdateOptions,
    label: &str,
) -> Result<Vec<DatestampChange>, UpdateError> {
    let variables = manifest
        .get_mut("variables")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| UpdateError::MissingVariables(label.to_string()))?;

    let mut changes = Vec::new();
    for (key, value) in variables.iter_mut() {
        let Some(kind) = variable_kind(key) else {
            continue;
        };
        let Some(stamp) = options.datestamp_for(kind) else {
            continue;
        };
        let previous = value.as_str().map(str::to_string);
        if previous.as_deref() == Some(stamp) {
            debug!(variable = %key, "Date stamp already current");
            continue;
        }

        *value = Value::String(stamp.to_string());
        changes.push(DatestampChange {
            variable: key.clone(),
            previous,
            updated: stamp.to_string(),
        });
    }
    Ok(changes)
}

/// Rewrites the manifest file in place. The file is untouched when nothing changes.
pub fn update_manifest_file(
    path: &Path,
    options: &UpdateOptions,
) -> Result<Vec<DatestampChange>, UpdateError> {
    let content = std::fs::read_to_string(path)?;
    let mut manifest: Value = serde_json::from_str(&content)?;
    let label = path.display().to_string();

    let changes = apply_datestamps(&mut manifest, options, &label)?;
    if !changes.is_empty() {
        let mut serialized = serde_json::to_string_pretty(&manifest)?;
        serialized.push('\n');
        std::fs::write(path, serialized)?;
        info!(manifest = %label, changed = changes.len(), "Updated date stamps");
    }
    Ok(changes)
}
