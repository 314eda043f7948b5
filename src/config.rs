use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use jwt_simple::algorithms::RS256KeyPair;

use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::mapper::MapperOptions;

/// How the client proves its identity when logging in
#[derive(Clone)]
pub enum Credentials {
    /// Plain password authentication
    Password(String),
    /// Key pair authentication, sent as a short-lived JWT
    KeyPair(RS256KeyPair),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(<redacted>)"),
            Credentials::KeyPair(_) => f.write_str("KeyPair(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Https,
    Http,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Https => "https",
            Protocol::Http => "http",
        }
    }
}

impl FromStr for Protocol {
    type Err = SnowflakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "https" => Ok(Protocol::Https),
            "http" => Ok(Protocol::Http),
            other => Err(SnowflakeError::Configuration(format!(
                "unsupported protocol `{other}`, expected https or http"
            ))),
        }
    }
}

/// The context a new session starts in
///
/// Every field is optional; Snowflake falls back to the user's defaults.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    /// Sent as `SESSION_PARAMETERS` in the login request, e.g. `QUERY_TAG`
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Everything needed to reach and authenticate against one Snowflake account
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub account: String,
    pub user: String,
    pub credentials: Credentials,
    /// Defaults to `<account>.snowflakecomputing.com`
    pub host: Option<String>,
    pub port: u16,
    pub protocol: Protocol,
    pub session: SessionOptions,
    /// Options applied when converting result rows
    pub mapper: MapperOptions,
}

impl ClientConfig {
    pub fn new(account: &str, user: &str, credentials: Credentials) -> ClientConfig {
        ClientConfig {
            account: account.to_owned(),
            user: user.to_owned(),
            credentials,
            host: None,
            port: 443,
            protocol: Protocol::Https,
            session: SessionOptions::default(),
            mapper: MapperOptions::default(),
        }
    }

    pub fn with_host(mut self, host: &str, port: u16, protocol: Protocol) -> ClientConfig {
        self.host = Some(host.to_owned());
        self.port = port;
        self.protocol = protocol;
        self
    }

    pub fn with_database(mut self, database: &str) -> ClientConfig {
        self.session.database = Some(database.to_owned());
        self
    }

    pub fn with_schema(mut self, schema: &str) -> ClientConfig {
        self.session.schema = Some(schema.to_owned());
        self
    }

    pub fn with_warehouse(mut self, warehouse: &str) -> ClientConfig {
        self.session.warehouse = Some(warehouse.to_owned());
        self
    }

    pub fn with_role(mut self, role: &str) -> ClientConfig {
        self.session.role = Some(role.to_owned());
        self
    }

    pub fn with_session_parameter(
        mut self,
        name: &str,
        value: impl Into<serde_json::Value>,
    ) -> ClientConfig {
        self.session
            .parameters
            .insert(name.to_ascii_uppercase(), value.into());
        self
    }

    pub fn with_mapper_options(mut self, mapper: MapperOptions) -> ClientConfig {
        self.mapper = mapper;
        self
    }

    /// The host requests are sent to, derived from the account if not set
    pub fn host(&self) -> String {
        match &self.host {
            Some(host) => host.to_owned(),
            None => format!(
                "{}.snowflakecomputing.com",
                self.account.to_ascii_lowercase()
            ),
        }
    }

    /// `protocol://host:port` without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host(), self.port)
    }

    /// Check the configuration before any request is made
    pub fn validate(&self) -> SnowflakeResult<()> {
        let invalid = |message: &str| Err(SnowflakeError::Configuration(message.to_owned()));
        if self.account.trim().is_empty() {
            return invalid("account must not be empty");
        }
        if self.user.trim().is_empty() {
            return invalid("user must not be empty");
        }
        if let Credentials::Password(password) = &self.credentials {
            if password.is_empty() {
                return invalid("password must not be empty");
            }
        }
        let host = self.host();
        if host.is_empty()
            || host.contains("://")
            || host.contains('/')
            || host.chars().any(char::is_whitespace)
        {
            return Err(SnowflakeError::Configuration(format!(
                "malformed host `{host}`, expected a bare host name"
            )));
        }
        if self.port == 0 {
            return invalid("port must not be 0");
        }
        reqwest::Url::parse(&self.base_url())
            .map_err(|e| SnowflakeError::Configuration(format!("malformed host `{host}`: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("XY12345.us-east-1", "me", Credentials::Password("pw".into()))
    }

    #[test]
    fn derives_host_from_account() {
        let config = config();
        assert_eq!(config.host(), "xy12345.us-east-1.snowflakecomputing.com");
        assert_eq!(
            config.base_url(),
            "https://xy12345.us-east-1.snowflakecomputing.com:443"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_protocol() {
        assert_eq!("HTTPS".parse::<Protocol>().unwrap(), Protocol::Https);
        assert!(matches!(
            "ftp".parse::<Protocol>(),
            Err(SnowflakeError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_missing_credentials_and_bad_hosts() {
        let no_password = ClientConfig::new("acct", "me", Credentials::Password(String::new()));
        assert!(matches!(
            no_password.validate(),
            Err(SnowflakeError::Configuration(_))
        ));
        let no_user = ClientConfig::new("acct", " ", Credentials::Password("pw".into()));
        assert!(no_user.validate().is_err());
        let with_scheme = config().with_host("https://example.com", 443, Protocol::Https);
        assert!(with_scheme.validate().is_err());
        let with_path = config().with_host("example.com/x", 443, Protocol::Https);
        assert!(with_path.validate().is_err());
        let local = config().with_host("localhost", 8080, Protocol::Http);
        assert!(local.validate().is_ok());
        assert_eq!(local.base_url(), "http://localhost:8080");
    }

    #[test]
    fn redacts_secrets() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("\"pw\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn session_parameters_are_upper_cased() {
        let config = config().with_session_parameter("query_tag", "nightly");
        assert_eq!(
            config.session.parameters.get("QUERY_TAG"),
            Some(&serde_json::json!("nightly"))
        );
    }
}
