//! Builders for the five session endpoints.
//!
//! Each function produces a fresh, single-use [`reqwest::Request`]. The
//! executor calls them again whenever a request has to be resent.
use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Request, Url};
use serde::Serialize;

use crate::bindings::Bindings;
use crate::config::{ClientConfig, Credentials};
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::jwt;
use crate::session::Session;

const LOGIN_PATH: &str = "/session/v1/login-request";
const TOKEN_PATH: &str = "/session/token-request";
const QUERY_PATH: &str = "/queries/v1/query-request";
const ABORT_PATH: &str = "/queries/v1/abort-request";
const LOGOUT_PATH: &str = "/session/logout-request";

const CLIENT_APP_ID: &str = env!("CARGO_PKG_NAME");
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn url(config: &ClientConfig, path: &str, query: &[(&str, &str)]) -> SnowflakeResult<Url> {
    let mut url = Url::parse(&format!("{}{path}", config.base_url()))
        .map_err(|e| SnowflakeError::Configuration(format!("malformed url: {e}")))?;
    url.query_pairs_mut()
        .extend_pairs(query)
        // Identifies this attempt, unlike requestId which identifies the logical call
        .append_pair("request_guid", &uuid::Uuid::new_v4().to_string());
    Ok(url)
}

fn headers(token: Option<&str>) -> SnowflakeResult<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(4);
    headers.append(CONTENT_TYPE, "application/json".parse()?);
    headers.append(ACCEPT, "application/snowflake".parse()?);
    headers.append(
        USER_AGENT,
        concat!(env!("CARGO_PKG_NAME"), '/', env!("CARGO_PKG_VERSION")).parse()?,
    );
    if let Some(token) = token {
        headers.append(AUTHORIZATION, format!("Snowflake Token=\"{token}\"").parse()?);
    }
    Ok(headers)
}

fn post<B: Serialize>(url: Url, headers: HeaderMap, body: Option<&B>) -> SnowflakeResult<Request> {
    let mut request = Request::new(Method::POST, url);
    *request.headers_mut() = headers;
    if let Some(body) = body {
        *request.body_mut() = Some(serde_json::to_vec(body)?.into());
    }
    Ok(request)
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ClientEnvironment {
    application: &'static str,
    os: &'static str,
    arch: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'static str,
    client_app_version: &'static str,
    account_name: String,
    login_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authenticator: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    client_environment: ClientEnvironment,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_parameters: Option<&'a BTreeMap<String, serde_json::Value>>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

pub(crate) fn login(config: &ClientConfig, request_id: uuid::Uuid) -> SnowflakeResult<Request> {
    // The account name excludes any region or cloud suffix
    let account_name = config
        .account
        .split('.')
        .next()
        .unwrap_or(&config.account)
        .to_ascii_uppercase();
    let (password, authenticator, token) = match &config.credentials {
        Credentials::Password(password) => (Some(password.as_str()), None, None),
        Credentials::KeyPair(key_pair) => (
            None,
            Some("SNOWFLAKE_JWT"),
            Some(jwt::login_token(key_pair, &config.account, &config.user)?),
        ),
    };
    let body = LoginRequest {
        data: LoginData {
            client_app_id: CLIENT_APP_ID,
            client_app_version: CLIENT_APP_VERSION,
            account_name,
            login_name: &config.user,
            password,
            authenticator,
            token,
            client_environment: ClientEnvironment {
                application: CLIENT_APP_ID,
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
            },
            session_parameters: Some(&config.session.parameters)
                .filter(|parameters| !parameters.is_empty()),
        },
    };

    let request_id = request_id.to_string();
    let options = &config.session;
    let mut query = vec![("requestId", request_id.as_str())];
    for (name, value) in [
        ("warehouse", &options.warehouse),
        ("databaseName", &options.database),
        ("schemaName", &options.schema),
        ("roleName", &options.role),
    ] {
        if let Some(value) = value {
            query.push((name, value.as_str()));
        }
    }
    post(url(config, LOGIN_PATH, &query)?, headers(None)?, Some(&body))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewRequest<'a> {
    old_session_token: &'a str,
    request_type: &'static str,
}

/// Authenticated with the master token, not the session token
pub(crate) fn renew(config: &ClientConfig, session: &Session) -> SnowflakeResult<Request> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let body = RenewRequest {
        old_session_token: session.token(),
        request_type: "RENEW",
    };
    post(
        url(config, TOKEN_PATH, &[("requestId", request_id.as_str())])?,
        headers(Some(session.master_token()))?,
        Some(&body),
    )
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest<'a> {
    pub sql_text: &'a str,
    pub describe_only: bool,
    #[serde(skip_serializing_if = "Bindings::is_empty")]
    pub bindings: &'a Bindings,
}

pub(crate) fn query(
    config: &ClientConfig,
    session: &Session,
    request_id: uuid::Uuid,
    body: &QueryRequest<'_>,
) -> SnowflakeResult<Request> {
    post(
        url(config, QUERY_PATH, &[("requestId", request_id.to_string().as_str())])?,
        headers(Some(session.token()))?,
        Some(body),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest {
    sql_text: &'static str,
    request_id: String,
}

/// Ask the server to stop the statement submitted with `target`
pub(crate) fn cancel(
    config: &ClientConfig,
    session: &Session,
    target: uuid::Uuid,
) -> SnowflakeResult<Request> {
    let request_id = uuid::Uuid::new_v4().to_string();
    post(
        url(config, ABORT_PATH, &[("requestId", request_id.as_str())])?,
        headers(Some(session.token()))?,
        Some(&CancelRequest {
            sql_text: "",
            request_id: target.to_string(),
        }),
    )
}

pub(crate) fn close(config: &ClientConfig, session: &Session) -> SnowflakeResult<Request> {
    let request_id = uuid::Uuid::new_v4().to_string();
    post::<()>(
        url(
            config,
            LOGOUT_PATH,
            &[("delete", "true"), ("requestId", request_id.as_str())],
        )?,
        headers(Some(session.token()))?,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("xy12345.eu-west-1", "henry", Credentials::Password("pw".into()))
            .with_warehouse("WH")
            .with_role("ANALYST")
    }

    fn body(request: &Request) -> serde_json::Value {
        let bytes = request
            .body()
            .and_then(|body| body.as_bytes())
            .expect("request should have a body");
        serde_json::from_slice(bytes).expect("body should be JSON")
    }

    #[test]
    fn login_request_carries_credentials_and_context() -> SnowflakeResult<()> {
        let request_id = uuid::Uuid::new_v4();
        let request = login(&config(), request_id)?;
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().path(), LOGIN_PATH);
        let query: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert!(query.contains(&("requestId".into(), request_id.to_string())));
        assert!(query.contains(&("warehouse".into(), "WH".into())));
        assert!(query.contains(&("roleName".into(), "ANALYST".into())));
        assert!(!query.iter().any(|(name, _)| name == "databaseName"));
        assert!(request.headers().get(AUTHORIZATION).is_none());

        let body = body(&request);
        assert_eq!(body["data"]["LOGIN_NAME"], "henry");
        assert_eq!(body["data"]["PASSWORD"], "pw");
        assert_eq!(body["data"]["ACCOUNT_NAME"], "XY12345");
        assert_eq!(body["data"]["CLIENT_APP_ID"], CLIENT_APP_ID);
        assert!(body["data"].get("SESSION_PARAMETERS").is_none());
        Ok(())
    }

    #[test]
    fn key_pair_login_sends_jwt() -> SnowflakeResult<()> {
        let key_pair = jwt_simple::algorithms::RS256KeyPair::generate(2048)?;
        let config = ClientConfig::new("acct", "henry", Credentials::KeyPair(key_pair))
            .with_session_parameter("QUERY_TAG", "tests");
        let body = body(&login(&config, uuid::Uuid::new_v4())?);
        assert_eq!(body["data"]["AUTHENTICATOR"], "SNOWFLAKE_JWT");
        assert!(body["data"]["TOKEN"].is_string());
        assert!(body["data"].get("PASSWORD").is_none());
        assert_eq!(body["data"]["SESSION_PARAMETERS"]["QUERY_TAG"], "tests");
        Ok(())
    }

    #[test]
    fn query_and_close_requests() -> SnowflakeResult<()> {
        let session = crate::stub::session("session-1", "master-1");
        let mut bindings = Bindings::new();
        bindings.push(10);
        let request = query(
            &config(),
            &session,
            uuid::Uuid::new_v4(),
            &QueryRequest {
                sql_text: "SELECT ?",
                describe_only: false,
                bindings: &bindings,
            },
        )?;
        assert_eq!(
            request.headers()[AUTHORIZATION],
            "Snowflake Token=\"session-1\""
        );
        assert_eq!(request.headers()[ACCEPT], "application/snowflake");
        assert_eq!(
            body(&request),
            serde_json::json!({
                "sqlText": "SELECT ?",
                "describeOnly": false,
                "bindings": {"1": {"type": "FIXED", "value": "10"}}
            })
        );

        let request = close(&config(), &session)?;
        assert_eq!(request.url().path(), LOGOUT_PATH);
        assert!(request
            .url()
            .query_pairs()
            .any(|(name, value)| name == "delete" && value == "true"));
        assert!(request.body().is_none());
        Ok(())
    }

    #[test]
    fn renewal_uses_master_token() -> SnowflakeResult<()> {
        let session = crate::stub::session("session-1", "master-1");
        let request = renew(&config(), &session)?;
        assert_eq!(request.url().path(), TOKEN_PATH);
        assert_eq!(
            request.headers()[AUTHORIZATION],
            "Snowflake Token=\"master-1\""
        );
        assert_eq!(
            body(&request),
            serde_json::json!({"oldSessionToken": "session-1", "requestType": "RENEW"})
        );
        Ok(())
    }
}
