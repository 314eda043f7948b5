use std::sync::Arc;

use serde::Serialize;

use crate::config::ClientConfig;
use crate::errors::SnowflakeResult;
use crate::executor::RequestExecutor;
use crate::mapper::{FromRow, Record, Shape};
use crate::requests;
use crate::session::{Session, SessionInfo};
use crate::statement::Statement;
use crate::transport::{self, Transport};

/// A client for one Snowflake account, holding at most one session
///
/// The session is created on first use (or explicitly with [`init_session`]),
/// renewed transparently once whenever the server reports it expired,
/// and dropped by [`close_session`].
///
/// Calls may be made concurrently from several tasks: creating, renewing and
/// closing the session are serialized, and a renewal is never duplicated.
///
/// [`init_session`]: SnowflakeClient::init_session
/// [`close_session`]: SnowflakeClient::close_session
#[derive(Debug)]
pub struct SnowflakeClient {
    executor: RequestExecutor,
}

impl SnowflakeClient {
    /// Validate the configuration and create a client with the default transport
    ///
    /// No request is made until the first operation.
    pub fn new(config: ClientConfig) -> SnowflakeResult<SnowflakeClient> {
        config.validate()?;
        let transport = Arc::new(transport::default_transport()?);
        Ok(SnowflakeClient {
            executor: RequestExecutor::new(config, transport),
        })
    }

    /// Replace the transport every request is sent through
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> SnowflakeClient {
        self.executor.set_transport(transport);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        self.executor.config()
    }

    pub(crate) fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Log in, replacing any session already held
    pub async fn init_session(&self) -> SnowflakeResult<SessionInfo> {
        Ok(self.executor.login().await?.info().clone())
    }

    /// Renew the held session with its master token
    ///
    /// Fails with [`SessionNotInitialized`](crate::SnowflakeError::SessionNotInitialized)
    /// if there is no session.
    pub async fn renew_session(&self) -> SnowflakeResult<()> {
        self.executor.renew(None).await.map(|_| ())
    }

    /// Close the held session
    ///
    /// The client holds no session afterwards, even if the server reports a failure.
    pub async fn close_session(&self) -> SnowflakeResult<()> {
        self.executor.close().await
    }

    /// The session currently held, if any
    pub async fn session(&self) -> Option<Arc<Session>> {
        self.executor.current().await
    }

    pub async fn is_active(&self) -> bool {
        self.session().await.is_some()
    }

    /// Start building a statement
    pub fn prepare(&self, sql: &str) -> Statement {
        Statement::new(sql, self)
    }

    /// Run a query and convert each row with [`FromRow`]
    ///
    /// `params` may be any serializable value; see [`crate::Bindings::from_serialize`].
    /// Use `&()` for no parameters.
    pub async fn execute_query<T: FromRow, P: Serialize + ?Sized>(
        &self,
        sql: &str,
        params: &P,
    ) -> SnowflakeResult<Vec<T>> {
        self.prepare(sql).bind_all(params)?.query().await
    }

    /// Run a query and map each row to `shape`
    pub async fn execute_query_as<P: Serialize + ?Sized>(
        &self,
        sql: &str,
        params: &P,
        shape: &Shape,
    ) -> SnowflakeResult<Vec<Record>> {
        self.prepare(sql).bind_all(params)?.query_as(shape).await
    }

    /// Run a query and return the first column of the first row, unconverted
    pub async fn execute_scalar<P: Serialize + ?Sized>(
        &self,
        sql: &str,
        params: &P,
    ) -> SnowflakeResult<Option<String>> {
        self.prepare(sql).bind_all(params)?.scalar().await
    }

    /// Run a statement and return the number of affected rows
    pub async fn execute_non_query<P: Serialize + ?Sized>(
        &self,
        sql: &str,
        params: &P,
    ) -> SnowflakeResult<i64> {
        self.prepare(sql).bind_all(params)?.execute().await
    }

    /// Ask the server to stop a statement submitted earlier
    ///
    /// `request_id` is the statement's [`Statement::request_id`]. This does not
    /// interrupt the local call waiting for that statement; it only stops the server.
    pub async fn cancel_query(&self, request_id: uuid::Uuid) -> SnowflakeResult<()> {
        log::info!("Cancelling statement {request_id}");
        self.executor
            .execute_authenticated::<serde_json::Value, _>(|config, session| {
                requests::cancel(config, session, request_id)
            })
            .await?;
        Ok(())
    }
}
