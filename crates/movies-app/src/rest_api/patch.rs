//! Partial update of a movie with JSON Patch style operations.
//!
//! Operations address fields of [`UpdateMovie`] by path (`/title`, `/genre`,
//! `/duration`) and are applied in order to a transient copy of the record.
//! First failing operation aborts the whole patch. The patched copy is then
//! validated, and only a valid copy is returned for merging into the record.

use std::str::FromStr;

use movies_dal::movie::{Movie, UpdateMovie};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validate::{validate, ValidationProblem, BODY_KEY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add {
        path: String,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        value: Value,
    },
    Remove {
        path: String,
    },
    Replace {
        path: String,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        value: Value,
    },
    Move {
        from: String,
        path: String,
    },
    Copy {
        from: String,
        path: String,
    },
    Test {
        path: String,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        value: Value,
    },
}

pub type PatchDocument = Vec<PatchOperation>;

/// Reads operations from JSON body, unknown operation or missing member
/// means the document cannot be applied
pub fn parse_document(body: Value) -> Result<PatchDocument, ValidationProblem> {
    serde_json::from_value(body).map_err(|e| {
        ValidationProblem::default().with_error(BODY_KEY, format!("Invalid patch document: {e}"))
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("Field {0} does not exist")]
    UnknownField(String),
    #[error("Value {value} is not valid for field {path}")]
    InvalidValue { path: String, value: String },
    #[error("Current value of {0} differs from tested value")]
    TestFailed(String),
}

impl PatchError {
    pub fn path(&self) -> &str {
        match self {
            PatchError::UnknownField(path) => path,
            PatchError::InvalidValue { path, .. } => path,
            PatchError::TestFailed(path) => path,
        }
    }
}

impl From<PatchError> for ValidationProblem {
    fn from(error: PatchError) -> Self {
        ValidationProblem::default().with_error(error.path(), error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MovieField {
    Title,
    Genre,
    Duration,
}

impl FromStr for MovieField {
    type Err = PatchError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let name = path.strip_prefix('/').unwrap_or(path);
        match name.to_ascii_lowercase().as_str() {
            "title" => Ok(MovieField::Title),
            "genre" => Ok(MovieField::Genre),
            "duration" => Ok(MovieField::Duration),
            _ => Err(PatchError::UnknownField(path.to_string())),
        }
    }
}

impl MovieField {
    fn get(self, target: &UpdateMovie) -> Value {
        let value = match self {
            MovieField::Title => target.title.clone().map(Value::String),
            MovieField::Genre => target.genre.clone().map(Value::String),
            MovieField::Duration => target.duration.map(Value::from),
        };
        value.unwrap_or(Value::Null)
    }

    /// Type checks value first, target is only changed when value fits
    fn set(self, target: &mut UpdateMovie, value: Value, path: &str) -> Result<(), PatchError> {
        match self {
            MovieField::Title => target.title = string_value(value, path)?,
            MovieField::Genre => target.genre = string_value(value, path)?,
            MovieField::Duration => target.duration = integer_value(value, path)?,
        }
        Ok(())
    }

    fn clear(self, target: &mut UpdateMovie) {
        match self {
            MovieField::Title => target.title = None,
            MovieField::Genre => target.genre = None,
            MovieField::Duration => target.duration = None,
        }
    }
}

fn invalid_value(path: &str, value: &Value) -> PatchError {
    PatchError::InvalidValue {
        path: path.to_string(),
        value: value.to_string(),
    }
}

fn string_value(value: Value, path: &str) -> Result<Option<String>, PatchError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(invalid_value(path, &other)),
    }
}

fn integer_value(value: Value, path: &str) -> Result<Option<i32>, PatchError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(ref n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid_value(path, &value)),
        other => Err(invalid_value(path, &other)),
    }
}

impl PatchOperation {
    pub fn apply_to(&self, target: &mut UpdateMovie) -> Result<(), PatchError> {
        match self {
            PatchOperation::Add { path, value } | PatchOperation::Replace { path, value } => {
                let field: MovieField = path.parse()?;
                field.set(target, value.clone(), path)
            }
            PatchOperation::Remove { path } => {
                let field: MovieField = path.parse()?;
                field.clear(target);
                Ok(())
            }
            PatchOperation::Move { from, path } => {
                let source: MovieField = from.parse()?;
                let field: MovieField = path.parse()?;
                if source != field {
                    let value = source.get(target);
                    field.set(target, value, path)?;
                    source.clear(target);
                }
                Ok(())
            }
            PatchOperation::Copy { from, path } => {
                let source: MovieField = from.parse()?;
                let field: MovieField = path.parse()?;
                let value = source.get(target);
                field.set(target, value, path)
            }
            PatchOperation::Test { path, value } => {
                let field: MovieField = path.parse()?;
                if field.get(target) == *value {
                    Ok(())
                } else {
                    Err(PatchError::TestFailed(path.clone()))
                }
            }
        }
    }
}

/// Applies operations in order, stops on first failure
pub fn apply(document: &[PatchOperation], target: &mut UpdateMovie) -> Result<(), PatchError> {
    document
        .iter()
        .try_for_each(|operation| operation.apply_to(target))
}

/// Patched and validated copy of the movie, ready to be merged.
///
/// The movie itself is never touched, on error the transient copy is dropped.
pub fn patched_update(
    movie: &Movie,
    document: &[PatchOperation],
) -> Result<UpdateMovie, ValidationProblem> {
    let mut transient = UpdateMovie::from(movie);
    apply(document, &mut transient)?;
    validate(&transient)?;
    Ok(transient)
}
