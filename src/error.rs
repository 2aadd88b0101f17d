use thiserror::Error;

/// Boxed error returned by caller-supplied literal writers and RPC collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("interpolate: number of ? [{placeholders}] must be equal to len(args) [{arguments}]")]
    ArgumentCountMismatch { placeholders: usize, arguments: usize },

    #[error("interpolate: args are not all filled into SQL, consumed {consumed} of {total}")]
    InterpolationIncomplete { consumed: usize, total: usize },

    #[error("interpolate: named parameters are not supported (got '{name}')")]
    NamedParametersUnsupported { name: String },

    #[error("interpolate: unsupported argument type: {kind}")]
    UnsupportedArgumentType { kind: String },

    #[error("interpolate: failed to render literal for args[{index}]: {source}")]
    ExtensibleLiteralRenderError {
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("transport: {message}")]
    Transport { message: String },

    #[error("auth: {message}")]
    Auth { message: String },

    #[error("auth: unrecognized auth mechanism: {mechanism}")]
    UnsupportedAuthMechanism { mechanism: String },

    #[error("session: session is closed")]
    SessionClosed,

    #[error("rpc: {message}")]
    Rpc { message: String },

    #[error("query: {message}")]
    StatementFailed { message: String },

    #[error("query: statement was cancelled")]
    StatementCancelled,

    #[error("timeout: query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("config: {message}")]
    Config { message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Wrap a collaborator failure as an opaque RPC error.
    pub fn rpc(err: impl std::fmt::Display) -> Self {
        DriverError::Rpc {
            message: err.to_string(),
        }
    }
}
