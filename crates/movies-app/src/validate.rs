use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::{Report, Validate};
use http::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";
/// Error key used when whole request body cannot be parsed
pub const BODY_KEY: &str = "$";

/// Problem details document listing all violations by field name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ValidationProblem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl Default for ValidationProblem {
    fn default() -> Self {
        ValidationProblem {
            problem_type: problem_type(StatusCode::BAD_REQUEST).to_string(),
            title: "One or more validation errors occurred.".to_string(),
            status: StatusCode::BAD_REQUEST.as_u16(),
            errors: BTreeMap::new(),
        }
    }
}

fn problem_type(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNPROCESSABLE_ENTITY => "https://tools.ietf.org/html/rfc9110#section-15.5.21",
        _ => "https://tools.ietf.org/html/rfc9110#section-15.5.1",
    }
}

impl ValidationProblem {
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_error(field, message);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status.as_u16();
        self.problem_type = problem_type(status).to_string();
        self
    }
}

impl From<&Report> for ValidationProblem {
    fn from(report: &Report) -> Self {
        report
            .iter()
            .fold(ValidationProblem::default(), |problem, (path, error)| {
                problem.with_error(path.to_string(), error.message())
            })
    }
}

impl From<Report> for ValidationProblem {
    fn from(report: Report) -> Self {
        ValidationProblem::from(&report)
    }
}

impl Display for ValidationProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for msg in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {msg}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl IntoResponse for ValidationProblem {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_REQUEST);
        (
            status,
            [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)],
            Json(self),
        )
            .into_response()
    }
}

/// Checks all rules of the payload, collecting every violation
pub fn validate<T>(payload: &T) -> Result<(), ValidationProblem>
where
    T: Validate<Context = ()>,
{
    payload.validate().map_err(ValidationProblem::from)
}

/// JSON body, parsing failures are rejected as problem document
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                debug!("Invalid request body: {}", rejection.body_text());
                ApiError::InvalidRequest(
                    ValidationProblem::default().with_error(BODY_KEY, rejection.body_text()),
                )
            })?;
        Ok(JsonBody(value))
    }
}

/// JSON body validated before handler is called
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate<Context = ()>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(payload) = JsonBody::<T>::from_request(req, state).await?;
        validate(&payload).map_err(ApiError::InvalidRequest)?;
        Ok(ValidJson(payload))
    }
}
