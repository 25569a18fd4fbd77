// Request dispatch: path -> descriptor -> connection -> routine call

use std::sync::Arc;

use axum::{
    http::{header::ALLOW, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::{pool::PoolConnection, Postgres};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::database::registry::{ConnectionRegistry, ConnectionSource, ResolutionError, SharedRegistry};
use crate::routines::binder::{EndpointDescriptor, EndpointTable, SharedEndpoints};
use crate::routines::call::{ParameterError, RequestParameters, RoutineCall, RoutineOutput};

/// SQLSTATE class for data exceptions (bad argument values and the like)
const DATA_EXCEPTION_CLASS: &str = "22";

/// Per-request failures. None of them touch shared state.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No endpoint is bound to {path}")]
    NotFound { path: String },

    #[error("Method {method} is not allowed for {path}")]
    MethodNotAllowed {
        path: String,
        method: Method,
        allowed: Method,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("Connection pool {connection} exhausted: timed out waiting for a connection.")]
    PoolExhausted { connection: String },

    #[error("Connection {connection} is unavailable: {source}")]
    ConnectionUnavailable {
        connection: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Routine execution failed: {message}")]
    Execution {
        routine: String,
        message: String,
        sqlstate: Option<String>,
    },
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Resolution(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Parameter(_) => StatusCode::BAD_REQUEST,
            Self::PoolExhausted { .. } | Self::ConnectionUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Execution { sqlstate, .. } => match sqlstate.as_deref() {
                Some(code) if code.starts_with(DATA_EXCEPTION_CLASS) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn acquisition(connection: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolExhausted {
                connection: connection.to_owned(),
            },
            source => Self::ConnectionUnavailable {
                connection: connection.to_owned(),
                source,
            },
        }
    }

    fn execution(routine: &str, err: sqlx::Error) -> Self {
        let (message, sqlstate): (String, Option<String>) = match &err {
            sqlx::Error::Database(db) => (db.message().to_owned(), db.code().map(|code| code.into_owned())),
            other => (other.to_string(), None),
        };

        Self::Execution {
            routine: routine.to_owned(),
            message,
            sqlstate,
        }
    }
}

/// Plain-text body; the resolution message is a compatibility surface
impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status: StatusCode = self.status();
        let allow: Option<HeaderValue> = match &self {
            Self::MethodNotAllowed { allowed, .. } => HeaderValue::from_str(allowed.as_str()).ok(),
            _ => None,
        };

        let mut response: Response = (status, self.to_string()).into_response();
        if let Some(allow) = allow {
            response.headers_mut().insert(ALLOW, allow);
        }
        response
    }
}

/// Dispatches requests against the current endpoint and registry snapshots
#[derive(Clone, Debug)]
pub struct Dispatcher {
    endpoints: SharedEndpoints,
    registry: SharedRegistry,
}

impl Dispatcher {
    pub fn new(endpoints: SharedEndpoints, registry: SharedRegistry) -> Self {
        Self { endpoints, registry }
    }

    pub fn endpoints(&self) -> &SharedEndpoints {
        &self.endpoints
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Finds the descriptor bound to `path` and checks the method
    pub fn lookup(&self, method: &Method, path: &str) -> Result<Arc<EndpointDescriptor>, DispatchError> {
        let table: Arc<EndpointTable> = self.endpoints.load();

        let descriptor: Arc<EndpointDescriptor> = table.get(path).ok_or_else(|| DispatchError::NotFound {
            path: path.to_owned(),
        })?;

        if descriptor.method != *method {
            return Err(DispatchError::MethodNotAllowed {
                path: path.to_owned(),
                method: method.clone(),
                allowed: descriptor.method.clone(),
            });
        }

        Ok(descriptor)
    }

    /// Maps the descriptor's connection name onto a pooled source.
    /// Nothing is acquired when the name does not resolve.
    pub fn resolve(&self, descriptor: &EndpointDescriptor) -> Result<ConnectionSource, ResolutionError> {
        let registry: Arc<ConnectionRegistry> = self.registry.load();
        registry.resolve(&descriptor.connection).cloned()
    }

    /// Runs one request: lookup, resolution, parameter binding, acquisition, call.
    /// Parameters are only parsed once the connection has resolved.
    #[instrument(skip(self, query, body), fields(connection = tracing::field::Empty))]
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Vec<(String, String)>,
        body: &[u8],
    ) -> Result<RoutineOutput, DispatchError> {
        let descriptor: Arc<EndpointDescriptor> = self.lookup(method, path)?;

        let source: ConnectionSource = self.resolve(&descriptor).inspect_err(|err| {
            warn!(routine = %descriptor.routine.qualified_name(), "{err}");
        })?;
        tracing::Span::current().record("connection", source.display_name());

        let params: RequestParameters = RequestParameters::from_request(query, body)?;
        let call: RoutineCall = RoutineCall::prepare(&descriptor.routine, &params)?;

        // The guard goes back to the pool on every exit, including a dropped future
        let mut conn: PoolConnection<Postgres> = source
            .pool()
            .acquire()
            .await
            .map_err(|err| DispatchError::acquisition(source.display_name(), err))?;

        debug!(sql = %call.sql(), "Executing routine");

        call.execute(&mut *conn).await.map_err(|err| {
            let err: DispatchError = DispatchError::execution(&descriptor.routine.qualified_name(), err);
            if let DispatchError::Execution { routine, sqlstate, .. } = &err {
                warn!(%routine, sqlstate = ?sqlstate, "{err}");
            }
            err
        })
    }
}
