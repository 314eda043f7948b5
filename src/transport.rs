use std::fmt::Debug;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::errors::SnowflakeResult;

/// Sends a fully built request and returns the raw response
///
/// The default is a pooled [`reqwest::Client`]. Replace it with
/// [`SnowflakeClient::with_transport`](crate::SnowflakeClient::with_transport)
/// to customize TLS, proxies or timeouts, or to stub the server in tests.
pub trait Transport: Debug + Send + Sync {
    fn execute(&self, request: reqwest::Request) -> BoxFuture<'_, reqwest::Result<reqwest::Response>>;
}

impl Transport for reqwest::Client {
    fn execute(&self, request: reqwest::Request) -> BoxFuture<'_, reqwest::Result<reqwest::Response>> {
        reqwest::Client::execute(self, request).boxed()
    }
}

/// The transport used unless the caller supplies one
pub(crate) fn default_transport() -> SnowflakeResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .gzip(true)
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}
