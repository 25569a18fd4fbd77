// Routine invocation: request parameters -> SQL call -> serialized result

use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};
use serde_json::{Map, Value};
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::Query,
    PgConnection, Postgres, Row,
};
use thiserror::Error;

use crate::routines::metadata::{quote_ident, ReturnKind, RoutineMetadata};

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Missing required parameter {0}")]
    Missing(String),

    #[error("Request body must be a JSON object: {0}")]
    InvalidBody(String),
}

/// Request parameters keyed by name. `None` binds SQL NULL.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestParameters {
    values: HashMap<String, Option<String>>,
}

impl RequestParameters {
    /// Merges query-string pairs with a JSON object body; body values win.
    pub fn from_request(query: Vec<(String, String)>, body: &[u8]) -> Result<Self, ParameterError> {
        let mut values: HashMap<String, Option<String>> = query
            .into_iter()
            .map(|(key, value)| (key, Some(value)))
            .collect();

        if !body.iter().all(u8::is_ascii_whitespace) {
            let object: Map<String, Value> = serde_json::from_slice(body)
                .map_err(|err| ParameterError::InvalidBody(err.to_string()))?;

            for (key, value) in object {
                values.insert(key, json_to_text(value));
            }
        }

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.values.get(key)
    }
}

fn json_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

/// Serialized routine result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineOutput {
    Empty,
    Text(Option<String>),
    Json(String),
}

impl IntoResponse for RoutineOutput {
    fn into_response(self) -> axum::response::Response {
        let (status, content_type, body): (StatusCode, &'static str, String) = match self {
            Self::Empty => return StatusCode::NO_CONTENT.into_response(),
            Self::Text(text) => (StatusCode::OK, "text/plain; charset=utf-8", text.unwrap_or_default()),
            Self::Json(json) => (StatusCode::OK, "application/json", json),
        };

        let mut response: Response<Body> = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }
}

/// A prepared call: SQL text plus its text-typed bind values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineCall {
    sql: String,
    binds: Vec<Option<String>>,
    returns: ReturnKind,
    returns_set: bool,
}

/// Request key for a parameter: its name, or `$N` when unnamed
pub fn parameter_key(position: usize, name: &str) -> String {
    if name.is_empty() {
        format!("${}", position + 1)
    } else {
        name.to_owned()
    }
}

impl RoutineCall {
    /// Builds the call. Named parameters use named notation so defaulted
    /// parameters can be left out; unnamed ones are positional.
    pub fn prepare(routine: &RoutineMetadata, params: &RequestParameters) -> Result<Self, ParameterError> {
        let mut arguments: Vec<String> = Vec::new();
        let mut binds: Vec<Option<String>> = Vec::new();
        let mut skipped: Option<String> = None;

        for (position, parameter) in routine.parameters.iter().enumerate() {
            let key: String = parameter_key(position, &parameter.name);

            let Some(value) = params.get(&key) else {
                if !parameter.has_default {
                    return Err(ParameterError::Missing(key));
                }
                skipped.get_or_insert(key);
                continue;
            };

            binds.push(value.clone());
            let placeholder: String = format!("${}::{}", binds.len(), parameter.sql_type);

            if parameter.name.is_empty() {
                // Positional arguments cannot follow an omitted one
                if let Some(omitted) = skipped.take() {
                    return Err(ParameterError::Missing(omitted));
                }
                arguments.push(placeholder);
            } else {
                arguments.push(format!("{} => {}", quote_ident(&parameter.name), placeholder));
            }
        }

        let call: String = format!("{}({})", routine.qualified_name(), arguments.join(", "));

        let sql: String = match (routine.returns, routine.returns_set) {
            (ReturnKind::Void, _) => format!("select {call}"),
            (_, true) => format!("select coalesce(json_agg(r), '[]'::json)::text from {call} as r"),
            (ReturnKind::Record, false) => format!("select to_json(r)::text from {call} as r"),
            (ReturnKind::Scalar, false) => format!("select ({call})::text"),
        };

        Ok(Self {
            sql,
            binds,
            returns: routine.returns,
            returns_set: routine.returns_set,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn query(&self) -> Query<'_, Postgres, PgArguments> {
        self.binds
            .iter()
            .fold(sqlx::query(&self.sql), |query, value| query.bind(value.as_deref()))
    }

    /// Runs the call on an already-acquired connection
    pub async fn execute(&self, conn: &mut PgConnection) -> Result<RoutineOutput, sqlx::Error> {
        match (self.returns, self.returns_set) {
            (ReturnKind::Void, _) => {
                self.query().execute(conn).await?;
                Ok(RoutineOutput::Empty)
            }
            (_, true) => {
                let row: PgRow = self.query().fetch_one(conn).await?;
                Ok(RoutineOutput::Json(row.try_get::<String, _>(0)?))
            }
            (ReturnKind::Record, false) => {
                let row: Option<PgRow> = self.query().fetch_optional(conn).await?;
                let json: Option<String> = row
                    .map(|row| row.try_get::<Option<String>, _>(0))
                    .transpose()?
                    .flatten();
                Ok(RoutineOutput::Json(json.unwrap_or_else(|| "null".to_owned())))
            }
            (ReturnKind::Scalar, false) => {
                let row: PgRow = self.query().fetch_one(conn).await?;
                Ok(RoutineOutput::Text(row.try_get::<Option<String>, _>(0)?))
            }
        }
    }
}
