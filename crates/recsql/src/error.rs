//! Error types for recsql

use thiserror::Error;

/// Result type alias for recsql operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for query compilation, statement caching and table access
#[derive(Debug, Error)]
pub enum OrmError {
    /// Malformed argument list or column reference (caller bug, never retried)
    #[error("Shape error: {0}")]
    Shape(String),

    /// No template set is registered for the dialect
    #[error("no template for {0:?} dialect")]
    UnknownDialect(String),

    /// Template source could not be parsed
    #[error("Template error: {0}")]
    Template(String),

    /// Template execution failed
    #[error("error rendering {template:?} for {dialect:?}: {message}")]
    Render {
        template: &'static str,
        dialect: String,
        message: String,
    },

    /// Statement construction failed against the live connection
    #[error("error preparing statement {sql:?}: {source}")]
    Prepare {
        sql: String,
        #[source]
        source: Box<OrmError>,
    },

    /// Releasing a prepared statement failed
    #[error("Release error: {0}")]
    Release(String),

    /// Several errors joined together (e.g. from closing a cache)
    #[error("{}", join_messages(.0))]
    Multiple(Vec<OrmError>),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),
}

fn join_messages(errors: &[OrmError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OrmError {
    /// Create a shape error
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Wrap a construction failure with the SQL that was being prepared
    pub fn prepare(sql: impl Into<String>, source: OrmError) -> Self {
        Self::Prepare {
            sql: sql.into(),
            source: Box::new(source),
        }
    }

    /// Join a list of errors. Returns `None` for an empty list and the sole
    /// error unchanged for a single-element list.
    pub fn join(mut errors: Vec<OrmError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Check if this is a shape error
    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Shape(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}
