use serde::{de::DeserializeOwned, Deserialize};

/// The server code reported when the session token has expired
/// and the master token should be used to renew it.
pub const SESSION_EXPIRED_CODE: i64 = 390112;

#[derive(thiserror::Error, Debug)]
pub enum SnowflakeError {
    #[error("Invalid client configuration: {0}")]
    Configuration(String),
    #[error("Authentication failed: {}", describe(.code, .message))]
    AuthenticationFailed { message: String, code: Option<i64> },
    #[error("Session renewal failed: {}", describe(.code, .message))]
    RenewalFailed { message: String, code: Option<i64> },
    #[error("No session has been initialized")]
    SessionNotInitialized,
    #[error("Snowflake server error: {}", describe(.code, .message))]
    OperationFailed { message: String, code: Option<i64> },
    #[error("Cannot map field `{field}`: {reason}")]
    Mapping { field: String, reason: String },
    #[error("Cannot bind parameter {index}: {reason}")]
    Binding { index: usize, reason: String },
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    #[error(transparent)]
    Token(#[from] jwt_simple::Error),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    JSONError(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}

fn describe(code: &Option<i64>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_owned(),
    }
}

impl SnowflakeError {
    /// The numeric code reported by the server, if this error came from one
    pub fn code(&self) -> Option<i64> {
        match self {
            SnowflakeError::AuthenticationFailed { code, .. }
            | SnowflakeError::RenewalFailed { code, .. }
            | SnowflakeError::OperationFailed { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        self.code() == Some(SESSION_EXPIRED_CODE)
    }

    pub(crate) fn mapping(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SnowflakeError::Mapping {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type SnowflakeResult<T> = Result<T, SnowflakeError>;

/// The envelope every session endpoint wraps its payload in.
///
/// `data` is kept as raw JSON until success is established,
/// because failed responses carry a differently shaped payload.
#[derive(Deserialize, Debug)]
pub(crate) struct WireEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    // Snowflake sends codes as strings ("390112"), but tolerate numbers too
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// A failure reported inside the envelope, before it is given a meaning
/// by the operation that received it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServerFailure {
    pub message: String,
    pub code: Option<i64>,
}

impl ServerFailure {
    pub fn is_session_expired(&self) -> bool {
        self.code == Some(SESSION_EXPIRED_CODE)
    }
}

impl WireEnvelope {
    pub fn code(&self) -> Option<i64> {
        match self.code.as_ref()? {
            serde_json::Value::Number(number) => number.as_i64(),
            serde_json::Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Split the envelope into the payload or the server-reported failure
    pub fn into_outcome<T: DeserializeOwned>(
        self,
    ) -> SnowflakeResult<Result<Option<T>, ServerFailure>> {
        if !self.success {
            let code = self.code();
            return Ok(Err(ServerFailure {
                message: self
                    .message
                    .unwrap_or_else(|| "no message returned".to_owned()),
                code,
            }));
        }
        match self.data {
            None | Some(serde_json::Value::Null) => Ok(Ok(None)),
            Some(data) => Ok(Ok(Some(serde_json::from_value(data)?))),
        }
    }
}
