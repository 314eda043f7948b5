use std::sync::Arc;

use reqwest::Request;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::errors::{ServerFailure, SnowflakeError, SnowflakeResult, WireEnvelope};
use crate::requests;
use crate::session::{LoginResponseData, RenewResponseData, Session};
use crate::transport::Transport;

impl From<ServerFailure> for SnowflakeError {
    fn from(failure: ServerFailure) -> Self {
        SnowflakeError::OperationFailed {
            message: failure.message,
            code: failure.code,
        }
    }
}

/// Owns the session slot and sends every request on behalf of the client
///
/// The slot only ever holds a complete session. It is locked while a session
/// is being created, renewed or dropped, so no request is built from a session
/// that is being replaced. Requests themselves are sent without the lock.
#[derive(Debug)]
pub(crate) struct RequestExecutor {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session: Mutex<Option<Arc<Session>>>,
}

impl RequestExecutor {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> RequestExecutor {
        RequestExecutor {
            config,
            transport,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    async fn send(&self, request: Request) -> SnowflakeResult<WireEnvelope> {
        log::debug!("{} {}", request.method(), request.url().path());
        let envelope = self
            .transport
            .execute(request)
            .await?
            .error_for_status()?
            .json::<WireEnvelope>()
            .await?;
        log::debug!(
            "Response success={} code={:?}",
            envelope.success,
            envelope.code()
        );
        Ok(envelope)
    }

    /// The session currently held, if any
    pub async fn current(&self) -> Option<Arc<Session>> {
        self.session.lock().await.clone()
    }

    /// Log in and replace whatever session was held
    pub async fn login(&self) -> SnowflakeResult<Arc<Session>> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            log::debug!("Replacing the current session with a new login");
        }
        self.login_locked(&mut slot).await
    }

    async fn login_locked(&self, slot: &mut Option<Arc<Session>>) -> SnowflakeResult<Arc<Session>> {
        let request_id = uuid::Uuid::new_v4();
        log::info!("Logging in as {} to {}", self.config.user, self.config.host());
        let outcome = self
            .send(requests::login(&self.config, request_id)?)
            .await?
            .into_outcome::<LoginResponseData>()?;
        match outcome {
            Ok(Some(data)) => {
                let session = Arc::new(Session::from_login(data));
                log::info!("Logged in, session {:?}", session.session_id());
                *slot = Some(session.clone());
                Ok(session)
            }
            Ok(None) => {
                *slot = None;
                Err(SnowflakeError::AuthenticationFailed {
                    message: "login response carried no session".into(),
                    code: None,
                })
            }
            Err(ServerFailure { message, code }) => {
                *slot = None;
                Err(SnowflakeError::AuthenticationFailed { message, code })
            }
        }
    }

    /// The held session, logging in first if there is none
    async fn current_or_login(&self) -> SnowflakeResult<Arc<Session>> {
        let mut slot = self.session.lock().await;
        match slot.as_ref() {
            Some(session) => Ok(session.clone()),
            None => self.login_locked(&mut slot).await,
        }
    }

    /// Renew the held session with its master token
    ///
    /// When `stale` is given and the slot already holds a different session,
    /// another caller has renewed it in the meantime and that session is returned.
    /// A rejected renewal drops the session.
    pub async fn renew(&self, stale: Option<&Arc<Session>>) -> SnowflakeResult<Arc<Session>> {
        let mut slot = self.session.lock().await;
        let current = slot.clone().ok_or(SnowflakeError::SessionNotInitialized)?;
        if let Some(stale) = stale {
            if !Arc::ptr_eq(stale, &current) {
                log::debug!("Session was already renewed");
                return Ok(current);
            }
        }
        log::info!("Renewing session {:?}", current.session_id());
        let outcome = self
            .send(requests::renew(&self.config, &current)?)
            .await?
            .into_outcome::<RenewResponseData>()?;
        match outcome {
            Ok(Some(data)) => {
                let renewed = Arc::new(current.renewed(data));
                *slot = Some(renewed.clone());
                Ok(renewed)
            }
            Ok(None) => {
                *slot = None;
                Err(SnowflakeError::RenewalFailed {
                    message: "renewal response carried no tokens".into(),
                    code: None,
                })
            }
            Err(ServerFailure { message, code }) => {
                log::warn!("Session renewal rejected: {message}");
                *slot = None;
                Err(SnowflakeError::RenewalFailed { message, code })
            }
        }
    }

    /// Close the held session
    ///
    /// The session is dropped locally before the server is asked to close it,
    /// so the client holds no session afterwards whatever the server answers.
    pub async fn close(&self) -> SnowflakeResult<()> {
        let Some(session) = self.session.lock().await.take() else {
            log::debug!("No session to close");
            return Ok(());
        };
        log::info!("Closing session {:?}", session.session_id());
        let outcome = match self.send(requests::close(&self.config, &session)?).await {
            Ok(envelope) => envelope.into_outcome::<serde_json::Value>()?,
            Err(error) => {
                log::warn!("Failed to close session: {error}");
                return Err(error);
            }
        };
        outcome.map(|_| ()).map_err(|failure| {
            log::warn!("Server refused to close session: {}", failure.message);
            failure.into()
        })
    }

    /// Send an authenticated request, renewing the session once if it expired
    ///
    /// `recipe` is called for every attempt, because a request cannot be sent twice.
    /// Only the session expiry code triggers a renewal and a second attempt;
    /// every other failure, and any failure of the second attempt, is returned
    /// as [`SnowflakeError::OperationFailed`].
    pub async fn execute_authenticated<T, F>(&self, recipe: F) -> SnowflakeResult<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn(&ClientConfig, &Session) -> SnowflakeResult<Request>,
    {
        let session = self.current_or_login().await?;
        let failure = match self
            .send(recipe(&self.config, &session)?)
            .await?
            .into_outcome::<T>()?
        {
            Ok(data) => return Ok(data),
            Err(failure) => failure,
        };
        if !failure.is_session_expired() {
            return Err(failure.into());
        }

        log::info!("Session token expired, renewing and retrying once");
        let renewed = self.renew(Some(&session)).await?;
        self.send(recipe(&self.config, &renewed)?)
            .await?
            .into_outcome::<T>()?
            .map_err(SnowflakeError::from)
    }
}
