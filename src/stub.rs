//! A scripted server for tests: replays envelopes in order and records requests.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use crate::config::{ClientConfig, Credentials, Protocol};
use crate::session::{LoginResponseData, Session};
use crate::transport::Transport;

pub const LOGIN: &str = "/session/v1/login-request";
pub const TOKEN: &str = "/session/token-request";
pub const QUERY: &str = "/queries/v1/query-request";
pub const ABORT: &str = "/queries/v1/abort-request";
pub const LOGOUT: &str = "/session/logout-request";

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub body: Value,
}

impl SentRequest {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<SentRequest>>,
}

impl StubTransport {
    pub fn new(responses: impl IntoIterator<Item = Value>) -> Arc<StubTransport> {
        let _ = env_logger::try_init();
        Arc::new(StubTransport {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::default(),
        })
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

impl Transport for StubTransport {
    fn execute(&self, request: reqwest::Request) -> BoxFuture<'_, reqwest::Result<reqwest::Response>> {
        let sent = SentRequest {
            path: request.url().path().to_owned(),
            query: request.url().query_pairs().into_owned().collect(),
            authorization: request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            body: request
                .body()
                .and_then(|body| body.as_bytes())
                .map_or(Value::Null, |bytes| serde_json::from_slice(bytes).unwrap()),
        };
        let reply = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request to {}", sent.path));
        self.requests.lock().unwrap().push(sent);
        let response = http::Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(reply.to_string())
            .unwrap();
        futures::future::ready(Ok(reqwest::Response::from(response))).boxed()
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::new("stub", "henry", Credentials::Password("secret".into()))
        .with_host("localhost", 8080, Protocol::Http)
        .with_warehouse("WH")
        .with_database("DB")
}

pub fn login_ok(token: &str, master_token: &str) -> Value {
    json!({
        "success": true,
        "message": null,
        "code": null,
        "data": {
            "token": token,
            "masterToken": master_token,
            "validityInSeconds": 3600,
            "masterValidityInSeconds": 14400,
            "sessionId": 1,
            "displayUserName": "HENRY",
            "serverVersion": "8.1.0",
            "sessionInfo": {
                "databaseName": "DB",
                "schemaName": "PUBLIC",
                "warehouseName": "WH",
                "roleName": "ANALYST"
            }
        }
    })
}

pub fn renew_ok(token: &str, master_token: &str) -> Value {
    json!({
        "success": true,
        "message": null,
        "code": null,
        "data": {
            "sessionToken": token,
            "validityInSecondsST": 3600,
            "masterToken": master_token,
            "validityInSecondsMT": 14400,
            "sessionId": 2
        }
    })
}

pub fn query_ok(data: Value) -> Value {
    json!({"success": true, "message": null, "code": null, "data": data})
}

pub fn ok_empty() -> Value {
    json!({"success": true, "message": null, "code": null, "data": null})
}

/// Snowflake sends codes as strings
pub fn failure(code: i64, message: &str) -> Value {
    json!({"success": false, "message": message, "code": code.to_string(), "data": null})
}

pub fn expired() -> Value {
    failure(390112, "Session token expired")
}

/// A session built the way a login would build it
pub fn session(token: &str, master_token: &str) -> Session {
    let mut reply = login_ok(token, master_token);
    let data: LoginResponseData = serde_json::from_value(reply["data"].take()).unwrap();
    Session::from_login(data)
}
