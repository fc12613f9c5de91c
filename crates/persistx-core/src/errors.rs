use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers and tests can match on
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    ConstraintViolation,

    // Configuration
    ConfigNotFound,
    InvalidConfig,

    // Lifecycle
    /// Loading the descriptor or building the registry/factory failed
    Initialization,
    /// The session factory was requested after the provider was shut down
    UseAfterShutdown,
    /// A handle tried to use resources of a destroyed registry
    RegistryClosed,
    /// An operation was attempted on a closed session
    SessionClosed,
    /// begin/commit/rollback called in the wrong transaction state
    TransactionState,

    // Second-level cache
    /// A write conflicts with the region's cache strategy (e.g. update of a read-only entity)
    CacheStrategyViolation,

    // Integration/IO
    Io,
    Persistence,
    Timeout,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::ConfigNotFound => "ERR_CONFIG_NOT_FOUND",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Initialization => "ERR_INITIALIZATION",
            ExErrorKind::UseAfterShutdown => "ERR_USE_AFTER_SHUTDOWN",
            ExErrorKind::RegistryClosed => "ERR_REGISTRY_CLOSED",
            ExErrorKind::SessionClosed => "ERR_SESSION_CLOSED",
            ExErrorKind::TransactionState => "ERR_TRANSACTION_STATE",
            ExErrorKind::CacheStrategyViolation => "ERR_CACHE_STRATEGY_VIOLATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification (`kind`) for programmatic handling plus optional
/// context: the operation, the entity involved and a nested cause.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity (table / cache region) context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity context, if any
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Walk the source chain and return the innermost error
    pub fn root_cause(&self) -> &ExError {
        let mut current = self;
        while let Some(next) = current.source.as_deref() {
            current = next;
        }
        current
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Wrap a construction failure as the fatal initialization error
pub fn initialization_error(cause: ExError) -> ExError {
    ExError::new(ExErrorKind::Initialization)
        .with_op(persistx_core_types::schema::OP_INITIALIZE)
        .with_message("initial session factory creation failed")
        .with_source(cause)
}

/// Error returned when a destroyed registry is asked for resources
pub fn registry_closed(op: &str) -> ExError {
    ExError::new(ExErrorKind::RegistryClosed)
        .with_op(op.to_string())
        .with_message("resource registry has been destroyed")
}

/// Error returned when a closed session is used
pub fn session_closed(op: &str) -> ExError {
    ExError::new(ExErrorKind::SessionClosed)
        .with_op(op.to_string())
        .with_message("session is closed")
}

// ========== End Error Facility ==========

/// Errors raised while reading and validating the persistence descriptor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The descriptor file does not exist
    #[error("Configuration descriptor not found: {path}")]
    NotFound { path: String },

    /// The descriptor exists but could not be read
    #[error("Failed to read configuration descriptor {path}: {message}")]
    Read { path: String, message: String },

    /// The descriptor is not valid TOML or does not match the schema
    #[error("Malformed configuration descriptor {path}: {message}")]
    Parse { path: String, message: String },

    /// A single setting has an unacceptable value
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        let kind = match &err {
            ConfigError::NotFound { .. } => ExErrorKind::ConfigNotFound,
            ConfigError::Read { .. } => ExErrorKind::Io,
            ConfigError::Parse { .. } | ConfigError::InvalidSetting { .. } => {
                ExErrorKind::InvalidConfig
            }
        };
        ExError::new(kind)
            .with_op("config_load")
            .with_message(err.to_string())
    }
}
