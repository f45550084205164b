use std::fmt;
use std::io::Read;

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{ContentChanges, content_text};

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to read message body")]
    ReadingBody(#[source] std::io::Error),
    #[error("failed to parse json body: {0}")]
    ParsingBody(#[source] serde_json::Error),
    #[error("missing data in body")]
    NoData,
    #[error("patch {index}: unsupported operation '{op}', expected add, remove or replace")]
    UnsupportedOp { index: usize, op: String },
    #[error("patch {index}: '{op}' on '{path}' requires a value")]
    MissingValue {
        index: usize,
        op: PatchOp,
        path: String,
    },
    #[error("patch {index}: '{path}' cannot be removed")]
    RequiredField { index: usize, path: String },
    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

impl PatchOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "add" => Some(PatchOp::Add),
            "remove" => Some(PatchOp::Remove),
            "replace" => Some(PatchOp::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOp::Add => write!(f, "add"),
            PatchOp::Remove => write!(f, "remove"),
            PatchOp::Replace => write!(f, "replace"),
        }
    }
}

/// A single validated field-level operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    pub value: Option<Value>,
}

impl Patch {
    pub fn replace(path: &str, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.to_string(),
            value: Some(value),
        }
    }

    pub fn remove(path: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.to_string(),
            value: None,
        }
    }

    /// The targeted field, accepting JSON-pointer style `/field` paths.
    pub fn field(&self) -> &str {
        self.path.strip_prefix('/').unwrap_or(&self.path)
    }
}

#[derive(Debug, Deserialize)]
struct RawPatch {
    op: String,
    path: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Decodes and validates a batch of patch operations.
///
/// Either every entry is well-formed or the whole batch is rejected.
pub fn parse_patches<R: Read>(mut body: R) -> Result<Vec<Patch>, PatchError> {
    let mut raw = Vec::new();
    body.read_to_end(&mut raw).map_err(PatchError::ReadingBody)?;

    let raw_patches: Vec<RawPatch> =
        serde_json::from_slice(&raw).map_err(PatchError::ParsingBody)?;

    if raw_patches.is_empty() {
        return Err(PatchError::NoData);
    }

    raw_patches
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let op = PatchOp::parse(&raw.op).ok_or_else(|| PatchError::UnsupportedOp {
                index,
                op: raw.op.clone(),
            })?;

            if op != PatchOp::Remove && raw.value.is_none() {
                return Err(PatchError::MissingValue {
                    index,
                    op,
                    path: raw.path,
                });
            }

            Ok(Patch {
                op,
                path: raw.path,
                value: raw.value,
            })
        })
        .collect()
}

/// Interprets a validated batch as column updates, converting values strictly.
///
/// Only `publish_date`, `approved` and `content` map onto stored columns;
/// other paths are ignored. Later operations on the same field override
/// earlier ones.
pub fn changes_from_patches(patches: &[Patch]) -> Result<ContentChanges, PatchError> {
    let mut changes = ContentChanges::default();

    for (index, patch) in patches.iter().enumerate() {
        let field = patch.field();
        let value = match (patch.op, &patch.value) {
            (PatchOp::Remove, _) => None,
            (_, Some(value)) => Some(value),
            (op, None) => {
                return Err(PatchError::MissingValue {
                    index,
                    op,
                    path: patch.path.clone(),
                });
            }
        };

        match (field, value) {
            ("publish_date", Some(value)) => {
                changes.publish_date = Some(Some(parse_publish_date(value)?));
            }
            ("publish_date", None) => changes.publish_date = Some(None),
            ("approved", Some(value)) => changes.approved = Some(parse_approved(value)?),
            ("content", Some(value)) => {
                let text = content_text(value.clone()).ok_or_else(|| PatchError::InvalidValue {
                    path: "content".to_string(),
                    reason: "content cannot be null".to_string(),
                })?;
                changes.content = Some(text);
            }
            ("approved" | "content", None) => {
                return Err(PatchError::RequiredField {
                    index,
                    path: patch.path.clone(),
                });
            }
            _ => {
                tracing::debug!(path = %patch.path, "ignoring patch for immutable field");
            }
        }
    }

    Ok(changes)
}

fn parse_publish_date(value: &Value) -> Result<chrono::NaiveDateTime, PatchError> {
    let invalid = |reason: String| PatchError::InvalidValue {
        path: "publish_date".to_string(),
        reason,
    };

    let text = value
        .as_str()
        .ok_or_else(|| invalid(format!("expected an RFC 3339 string, got {value}")))?;

    DateTime::parse_from_rfc3339(text)
        .map(|parsed| parsed.naive_utc())
        .map_err(|err| invalid(format!("'{text}' is not an RFC 3339 timestamp: {err}")))
}

fn parse_approved(value: &Value) -> Result<bool, PatchError> {
    let parsed = match value {
        Value::Bool(approved) => Some(*approved),
        Value::String(text) => match text.as_str() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    };

    parsed.ok_or_else(|| PatchError::InvalidValue {
        path: "approved".to_string(),
        reason: format!("expected a boolean, got {value}"),
    })
}
