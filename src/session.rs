use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Descriptive attributes of a session, kept across renewals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub display_user_name: Option<String>,
    pub server_version: Option<String>,
}

/// One authenticated server-side session
///
/// A session is never updated in place: renewal produces a new value,
/// and the client swaps it in as a whole.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    master_token: String,
    validity: Duration,
    master_validity: Duration,
    session_id: Option<i64>,
    info: SessionInfo,
}

impl Session {
    pub(crate) fn from_login(data: LoginResponseData) -> Session {
        let info = data.session_info.unwrap_or_default();
        Session {
            token: data.token,
            master_token: data.master_token,
            validity: Duration::from_secs(data.validity_in_seconds),
            master_validity: Duration::from_secs(data.master_validity_in_seconds),
            session_id: data.session_id,
            info: SessionInfo {
                database: info.database_name,
                schema: info.schema_name,
                warehouse: info.warehouse_name,
                role: info.role_name,
                display_user_name: data.display_user_name,
                server_version: data.server_version,
            },
        }
    }

    /// A new session carrying this session's attributes and the renewed tokens
    pub(crate) fn renewed(&self, data: RenewResponseData) -> Session {
        Session {
            token: data.session_token,
            master_token: data.master_token,
            validity: Duration::from_secs(data.validity_in_seconds_st),
            master_validity: Duration::from_secs(data.validity_in_seconds_mt),
            session_id: data.session_id.or(self.session_id),
            info: self.info.clone(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn master_token(&self) -> &str {
        &self.master_token
    }

    /// How long the session token is valid for after it was issued
    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn master_validity(&self) -> Duration {
        self.master_validity
    }

    pub fn session_id(&self) -> Option<i64> {
        self.session_id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("master_token", &"<redacted>")
            .field("validity", &self.validity)
            .field("master_validity", &self.master_validity)
            .field("session_id", &self.session_id)
            .field("info", &self.info)
            .finish()
    }
}

//
// Wire types
//

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponseData {
    pub token: String,
    pub master_token: String,
    #[serde(default)]
    pub validity_in_seconds: u64,
    #[serde(default)]
    pub master_validity_in_seconds: u64,
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub display_user_name: Option<String>,
    #[serde(default)]
    pub server_version: Option<String>,
    #[serde(default)]
    pub session_info: Option<WireSessionInfo>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSessionInfo {
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub warehouse_name: Option<String>,
    pub role_name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenewResponseData {
    pub session_token: String,
    pub master_token: String,
    #[serde(rename = "validityInSecondsST", default)]
    pub validity_in_seconds_st: u64,
    #[serde(rename = "validityInSecondsMT", default)]
    pub validity_in_seconds_mt: u64,
    #[serde(default)]
    pub session_id: Option<i64>,
}
