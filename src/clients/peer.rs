//! Peer service client.
//!
//! Peer data (user identities) cannot be fabricated, so every failure is
//! propagated to the caller. "Not found" is an answer, not a failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::error::ClientError;
use crate::clients::transport::HttpTransport;
use crate::clients::types::{NewUser, User};
use crate::config::PeerServiceConfig;
use crate::lifecycle::ShutdownSignal;
use crate::resilience::{CallOutcome, ResilientCallPolicy, RetryPlan};

/// Service name used in logs, metrics and errors.
pub const PEER_SERVICE: &str = "peer_service";

/// Read access to the user directory, whether remote or in-process.
pub trait UserDirectory: Send + Sync {
    fn fetch_users(
        &self,
        cancel: &ShutdownSignal,
    ) -> impl Future<Output = Result<Vec<User>, ClientError>> + Send;

    fn fetch_user(
        &self,
        id: u64,
        cancel: &ShutdownSignal,
    ) -> impl Future<Output = Result<Option<User>, ClientError>> + Send;
}

/// HTTP client for the peer service's user collection.
#[derive(Debug, Clone)]
pub struct PeerServiceClient {
    transport: HttpTransport,
    resource_path: String,
    policy: Arc<ResilientCallPolicy>,
}

impl PeerServiceClient {
    pub fn new(config: &PeerServiceConfig) -> Result<Self, ClientError> {
        let policy = ResilientCallPolicy::new(
            PEER_SERVICE,
            Duration::from_secs(config.timeout_secs),
            RetryPlan::from(&config.retry),
            (&config.breaker).into(),
        )
        .with_total_timeout(Duration::from_secs(config.total_timeout_secs));
        Self::with_policy(config, Arc::new(policy))
    }

    pub fn with_policy(config: &PeerServiceConfig, policy: Arc<ResilientCallPolicy>) -> Result<Self, ClientError> {
        Ok(Self {
            transport: HttpTransport::new(&config.base_url)?,
            resource_path: config.resource_path.trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn policy(&self) -> &ResilientCallPolicy {
        &self.policy
    }

    /// `GET /{resource}/{id}`; `Ok(None)` when the peer answers 404.
    pub async fn fetch_user(&self, id: u64, cancel: &ShutdownSignal) -> Result<Option<User>, ClientError> {
        tracing::info!(user_id = id, "Fetching user");
        let path = format!("{}/{}", self.resource_path, id);

        let outcome = self
            .policy
            .execute(|| self.transport.get_json::<User>(&path, &[]), cancel)
            .await;

        match self.resolve(outcome)? {
            Some(user) => {
                tracing::info!(user_id = user.id, name = %user.name, email = %user.email, "Fetched user");
                Ok(Some(user))
            }
            None => {
                tracing::warn!(user_id = id, "User not found");
                Ok(None)
            }
        }
    }

    /// `GET /{resource}`.
    pub async fn fetch_users(&self, cancel: &ShutdownSignal) -> Result<Vec<User>, ClientError> {
        tracing::info!("Fetching all users");

        let outcome = self
            .policy
            .execute(
                || self.transport.get_json::<Vec<User>>(&self.resource_path, &[]),
                cancel,
            )
            .await;

        let users = self.resolve(outcome)?.unwrap_or_else(|| {
            tracing::warn!(path = %self.resource_path, "User collection not found, treating as empty");
            Vec::new()
        });
        tracing::info!(count = users.len(), "Fetched users");
        Ok(users)
    }

    /// `POST /{resource}`. Never retried: creation is not idempotent.
    pub async fn create_user(&self, user: &NewUser, cancel: &ShutdownSignal) -> Result<User, ClientError> {
        tracing::info!(name = %user.name, "Creating user");

        let outcome = self
            .policy
            .execute_with_plan(
                &RetryPlan::no_retry(),
                || self.transport.post_json::<NewUser, User>(&self.resource_path, user),
                cancel,
            )
            .await;

        match self.resolve(outcome)? {
            Some(created) => {
                tracing::info!(user_id = created.id, "Created user");
                Ok(created)
            }
            None => Err(ClientError::NonRetryable {
                service: PEER_SERVICE.to_string(),
                message: format!("resource '{}' not found", self.resource_path),
            }),
        }
    }

    fn resolve<T>(&self, outcome: CallOutcome<T>) -> Result<Option<T>, ClientError> {
        if let Some(err) = ClientError::from_outcome(PEER_SERVICE, &outcome) {
            tracing::error!(error = %err, "Peer service call failed");
            return Err(err);
        }
        match outcome {
            CallOutcome::Success { value, .. } => Ok(value),
            CallOutcome::Failure { .. } => Ok(None),
        }
    }
}

impl UserDirectory for PeerServiceClient {
    async fn fetch_users(&self, cancel: &ShutdownSignal) -> Result<Vec<User>, ClientError> {
        PeerServiceClient::fetch_users(self, cancel).await
    }

    async fn fetch_user(&self, id: u64, cancel: &ShutdownSignal) -> Result<Option<User>, ClientError> {
        PeerServiceClient::fetch_user(self, id, cancel).await
    }
}

impl<D: UserDirectory> UserDirectory for Arc<D> {
    fn fetch_users(
        &self,
        cancel: &ShutdownSignal,
    ) -> impl Future<Output = Result<Vec<User>, ClientError>> + Send {
        (**self).fetch_users(cancel)
    }

    fn fetch_user(
        &self,
        id: u64,
        cancel: &ShutdownSignal,
    ) -> impl Future<Output = Result<Option<User>, ClientError>> + Send {
        (**self).fetch_user(id, cancel)
    }
}
