//! Rewriting of exported workflow blueprints.
//!
//! A blueprint is a JSON object whose `flow` array holds modules; router
//! modules nest further flows under `routes[].flow`. [`rewrite`] never mutates
//! its input: it walks the tree once and builds a new document according to a
//! [`Rewrite`] table.

pub mod modules;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::{Result, ToolError};

pub use modules::{BlueprintSettings, io_submission_rewrite, io_submission_subgraph};

/// Numeric module identifier as used in the `id` field.
pub type ModuleId = u64;

/// Change applied to one field of a module, addressed by a path of object keys
/// starting at the module root (e.g. `["mapper", "values", "18"]`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Set { path: Vec<String>, value: Value },
    /// Removing a key that is already absent is not an error.
    Remove { path: Vec<String> },
    AppendText { path: Vec<String>, suffix: String },
}

impl FieldEdit {
    pub fn set(path: &[&str], value: impl Into<Value>) -> Self {
        FieldEdit::Set {
            path: owned_path(path),
            value: value.into(),
        }
    }

    pub fn remove(path: &[&str]) -> Self {
        FieldEdit::Remove {
            path: owned_path(path),
        }
    }

    pub fn append_text(path: &[&str], suffix: impl Into<String>) -> Self {
        FieldEdit::AppendText {
            path: owned_path(path),
            suffix: suffix.into(),
        }
    }
}

fn owned_path(path: &[&str]) -> Vec<String> {
    path.iter().map(|segment| segment.to_string()).collect()
}

/// Rewrite table. Every entry is keyed by the id a module has in the input
/// document; inserted modules are emitted as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rewrite {
    /// Id remapping applied to pre-existing modules at any depth.
    pub renames: BTreeMap<ModuleId, ModuleId>,
    /// Modules dropped from the top-level flow.
    pub removals: BTreeSet<ModuleId>,
    pub edits: Vec<(ModuleId, FieldEdit)>,
    /// Top-level module to replace and the modules spliced in at its position.
    pub replacement: Option<(ModuleId, Vec<Value>)>,
}

/// What a rewrite pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub renamed: usize,
    pub removed: usize,
    pub edited: usize,
    /// Number of modules inserted, if the replacement target was found.
    pub inserted: Option<usize>,
}

/// Applies `rewrite` to `document` and returns the rewritten copy.
///
/// Fails when the document has no `flow` array, when an edit addresses a
/// field that cannot hold it, or when the result contains a module id twice.
#[instrument(level = "info", skip_all)]
pub fn rewrite(document: &Value, rewrite: &Rewrite) -> Result<(Value, RewriteSummary)> {
    let root = document
        .as_object()
        .ok_or_else(|| ToolError::Blueprint("expected a JSON object at the root".into()))?;
    let flow = root
        .get("flow")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::Blueprint("missing top-level flow array".into()))?;

    let mut summary = RewriteSummary::default();
    let mut matched_edits = BTreeSet::new();
    let rewritten = rewrite_flow(flow, rewrite, true, &mut summary, &mut matched_edits)?;

    for (index, (module, _)) in rewrite.edits.iter().enumerate() {
        if !matched_edits.contains(&index) {
            warn!(module, "edit target not found");
        }
    }
    if let Some((target, _)) = &rewrite.replacement {
        if summary.inserted.is_none() {
            warn!(module = target, "replacement target not in top-level flow; nothing spliced in");
        }
    }

    let mut output = root.clone();
    output.insert("flow".to_string(), Value::Array(rewritten));
    let output = Value::Object(output);

    ensure_unique_ids(&output)?;
    debug!(?summary, "blueprint rewritten");
    Ok((output, summary))
}

/// Removals and the replacement only apply to the top-level flow; renames and
/// edits reach every depth.
fn rewrite_flow(
    flow: &[Value],
    rewrite: &Rewrite,
    top_level: bool,
    summary: &mut RewriteSummary,
    matched_edits: &mut BTreeSet<usize>,
) -> Result<Vec<Value>> {
    let mut output = Vec::with_capacity(flow.len());

    for module in flow {
        let id = module_id(module);

        if top_level && id.is_some_and(|id| rewrite.removals.contains(&id)) {
            summary.removed += 1;
            continue;
        }

        if let Some((target, replacement)) = rewrite.replacement.as_ref().filter(|_| top_level) {
            if id == Some(*target) {
                output.extend(replacement.iter().cloned());
                summary.inserted = Some(replacement.len());
                continue;
            }
        }

        let mut module = module.clone();
        if let Some(id) = id {
            for (index, (_, edit)) in rewrite
                .edits
                .iter()
                .enumerate()
                .filter(|(_, (target, _))| *target == id)
            {
                apply_edit(&mut module, edit)
                    .map_err(|reason| ToolError::Blueprint(format!("module {id}: {reason}")))?;
                matched_edits.insert(index);
                summary.edited += 1;
            }

            if let Some(new_id) = rewrite.renames.get(&id) {
                module["id"] = Value::from(*new_id);
                summary.renamed += 1;
            }
        }

        if let Some(Value::Array(routes)) = module.get_mut("routes") {
            for route in routes.iter_mut() {
                if let Some(Value::Array(nested)) = route.get_mut("flow") {
                    let rewritten = rewrite_flow(nested, rewrite, false, summary, matched_edits)?;
                    *nested = rewritten;
                }
            }
        }

        output.push(module);
    }

    Ok(output)
}

fn module_id(module: &Value) -> Option<ModuleId> {
    module.get("id").and_then(Value::as_u64)
}

fn apply_edit(module: &mut Value, edit: &FieldEdit) -> std::result::Result<(), String> {
    match edit {
        FieldEdit::Set { path, value } => {
            let (parent, key) = parent_object(module, path)?;
            parent.insert(key.to_string(), value.clone());
        }
        FieldEdit::Remove { path } => {
            let (parent, key) = parent_object(module, path)?;
            parent.shift_remove(key);
        }
        FieldEdit::AppendText { path, suffix } => {
            let (parent, key) = parent_object(module, path)?;
            match parent.get_mut(key) {
                Some(Value::String(text)) => text.push_str(suffix),
                Some(_) => return Err(format!("{} is not a string", path.join("."))),
                None => {
                    parent.insert(key.to_string(), Value::String(suffix.clone()));
                }
            }
        }
    }
    Ok(())
}

/// Resolves every path segment but the last, requiring objects along the way.
fn parent_object<'a, 'p>(
    module: &'a mut Value,
    path: &'p [String],
) -> std::result::Result<(&'a mut Map<String, Value>, &'p str), String> {
    let (key, parents) = path
        .split_last()
        .ok_or_else(|| "empty field path".to_string())?;

    let mut current = module;
    for (depth, segment) in parents.iter().enumerate() {
        current = current
            .get_mut(segment.as_str())
            .ok_or_else(|| format!("missing field {}", path[..=depth].join(".")))?;
    }

    let parent = current
        .as_object_mut()
        .ok_or_else(|| format!("{} is not an object", parents.join(".")))?;
    Ok((parent, key.as_str()))
}

/// Fails when two modules anywhere in the tree share an id.
pub fn ensure_unique_ids(document: &Value) -> Result<()> {
    let mut seen = BTreeSet::new();
    let flow = document
        .get("flow")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    collect_ids(flow, &mut seen)
}

fn collect_ids(flow: &[Value], seen: &mut BTreeSet<ModuleId>) -> Result<()> {
    for module in flow {
        if let Some(id) = module_id(module) {
            if !seen.insert(id) {
                return Err(ToolError::Blueprint(format!("duplicate module id {id}")));
            }
        }
        let routes = module.get("routes").and_then(Value::as_array);
        for route in routes.into_iter().flatten() {
            if let Some(nested) = route.get("flow").and_then(Value::as_array) {
                collect_ids(nested, seen)?;
            }
        }
    }
    Ok(())
}
