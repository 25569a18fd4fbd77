// Routine metadata as read from the database catalog

use serde::Serialize;

/// Volatility class declared on the routine (`pg_proc.provolatile`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Volatility {
    Immutable,
    Stable,
    Volatile,
}

impl Volatility {
    pub fn from_catalog(code: &str) -> Self {
        match code {
            "i" => Self::Immutable,
            "s" => Self::Stable,
            _ => Self::Volatile,
        }
    }
}

/// Shape of the value a routine returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    Void,
    Scalar,
    Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineParameter {
    /// Declared name, empty for unnamed parameters
    pub name: String,
    /// SQL type as rendered by `format_type`
    pub sql_type: String,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineMetadata {
    pub schema: String,
    pub name: String,
    pub parameters: Vec<RoutineParameter>,
    pub comment: Option<String>,
    pub volatility: Volatility,
    pub returns: ReturnKind,
    pub returns_set: bool,
}

impl RoutineMetadata {
    /// Convenience constructor for a parameterless routine
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            parameters: Vec::new(),
            comment: None,
            volatility: Volatility::Volatile,
            returns: ReturnKind::Scalar,
            returns_set: false,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_volatility(mut self, volatility: Volatility) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_returns(mut self, returns: ReturnKind, returns_set: bool) -> Self {
        self.returns = returns;
        self.returns_set = returns_set;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, sql_type: impl Into<String>, has_default: bool) -> Self {
        self.parameters.push(RoutineParameter {
            name: name.into(),
            sql_type: sql_type.into(),
            has_default,
        });
        self
    }

    /// Schema-qualified, quoted name usable in SQL text
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

/// Quotes an SQL identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
