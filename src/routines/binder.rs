// Route binding: one endpoint descriptor per catalog routine

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::Method;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::routines::directive::{self, Directives};
use crate::routines::metadata::{RoutineMetadata, Volatility};

/// Schema whose routines are mounted without a schema segment
const DEFAULT_SCHEMA: &str = "public";

/// Startup-time binding failures. The process must not start.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Routines {first} and {second} both map to path {path}")]
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },

    #[error("Routine {routine} declares unsupported method '{method}'")]
    InvalidMethod { routine: String, method: String },

    #[error("Routine {routine} maps to path {path}, which is reserved for the gateway's {reserved_by} endpoint")]
    ReservedPath {
        path: String,
        routine: String,
        reserved_by: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    /// Prefix every generated path starts with, e.g. `/api`
    pub url_path_prefix: String,
    /// Paths already served by the gateway itself
    pub reserved_paths: Vec<String>,
}

/// A routine bound to an HTTP path. Immutable once built.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub path: String,
    pub method: Method,
    /// Connection directive value; empty means the default connection
    pub connection: String,
    pub routine: Arc<RoutineMetadata>,
}

/// Endpoint lookup table keyed by path
#[derive(Debug, Default)]
pub struct EndpointTable {
    endpoints: HashMap<String, Arc<EndpointDescriptor>>,
}

impl EndpointTable {
    pub fn get(&self, path: &str) -> Option<Arc<EndpointDescriptor>> {
        self.endpoints.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Descriptors ordered by path
    pub fn descriptors(&self) -> Vec<Arc<EndpointDescriptor>> {
        let mut descriptors: Vec<Arc<EndpointDescriptor>> = self.endpoints.values().cloned().collect();
        descriptors.sort_by(|a, b| a.path.cmp(&b.path));
        descriptors
    }
}

/// Shared handle on the current endpoint table; rebuilt wholesale on reload
#[derive(Clone, Debug)]
pub struct SharedEndpoints {
    current: Arc<ArcSwap<EndpointTable>>,
}

impl SharedEndpoints {
    pub fn new(table: EndpointTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    pub fn load(&self) -> Arc<EndpointTable> {
        self.current.load_full()
    }

    pub fn install(&self, table: EndpointTable) {
        self.current.store(Arc::new(table));
    }
}

/// Lower-cases a name and swaps underscores for hyphens
pub fn path_segment(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

/// Name-derived path: `{prefix}/{schema}/{name}`, schema omitted for `public`
pub fn derive_path(prefix: &str, routine: &RoutineMetadata) -> String {
    if routine.schema == DEFAULT_SCHEMA {
        format!("{prefix}/{}", path_segment(&routine.name))
    } else {
        format!("{prefix}/{}/{}", path_segment(&routine.schema), path_segment(&routine.name))
    }
}

fn override_path(prefix: &str, custom: &str) -> String {
    let trimmed: &str = custom.trim().trim_matches('/');
    format!("{prefix}/{}", trimmed.to_lowercase())
}

fn resolve_method(routine: &RoutineMetadata, directives: &Directives) -> Result<Method, BindError> {
    if let Some(raw) = directives.method.as_deref() {
        return match raw.to_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(BindError::InvalidMethod {
                routine: routine.qualified_name(),
                method: raw.to_owned(),
            }),
        };
    }

    let read_only: bool = matches!(routine.volatility, Volatility::Immutable | Volatility::Stable);
    if read_only || routine.name.to_lowercase().starts_with("get_") {
        Ok(Method::GET)
    } else {
        Ok(Method::POST)
    }
}

/// Binds every routine to an endpoint.
///
/// `registered` is only used to warn about connection names that do not
/// resolve yet; such endpoints still bind and fail per request.
pub fn bind(
    routines: Vec<RoutineMetadata>,
    registered: &[&str],
    options: &BindOptions,
) -> Result<EndpointTable, BindError> {
    let mut endpoints: HashMap<String, Arc<EndpointDescriptor>> = HashMap::with_capacity(routines.len());

    for routine in routines {
        let directives: Directives = directive::parse(routine.comment.as_deref());

        let path: String = match directives.path.as_deref() {
            Some(custom) => override_path(&options.url_path_prefix, custom),
            None => derive_path(&options.url_path_prefix, &routine),
        };
        let method: Method = resolve_method(&routine, &directives)?;
        let connection: String = directives.connection_name().to_owned();

        if !connection.is_empty() && !registered.contains(&connection.as_str()) {
            warn!(
                routine = %routine.qualified_name(),
                connection = %connection,
                "Routine names a connection that is not registered; requests will fail until it is"
            );
        }

        if options.reserved_paths.contains(&path) {
            return Err(BindError::ReservedPath {
                reserved_by: path.trim_start_matches('/').to_owned(),
                path,
                routine: routine.qualified_name(),
            });
        }

        if let Some(existing) = endpoints.get(&path) {
            return Err(BindError::DuplicatePath {
                path,
                first: existing.routine.qualified_name(),
                second: routine.qualified_name(),
            });
        }

        debug!(%path, %method, connection = %connection, "Bound routine");

        endpoints.insert(
            path.clone(),
            Arc::new(EndpointDescriptor {
                path,
                method,
                connection,
                routine: Arc::new(routine),
            }),
        );
    }

    info!("Bound {} routine endpoints", endpoints.len());
    Ok(EndpointTable { endpoints })
}
