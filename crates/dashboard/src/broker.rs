//! CRM token broker.
//!
//! The CRM rotates refresh tokens on every use: a refresh answers with a new
//! pair and the old refresh token stops working. The broker therefore
//! persists the new refresh token before handing out the access token, and
//! serializes refreshes per credential so two concurrent requests never spend
//! the same refresh token.
//!
//! It also owns the OAuth `state` lifecycle (create, single-use take, stale
//! purge) for every provider the dashboard connects to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use agent_tools::{TokenSource, ToolError};
use async_trait::async_trait;
use database::models::OAuthState;
use database::{oauth_state, sub_account, user, CompanyPin, DatabaseError, SqlitePool};
use ghl_client::{GhlClient, GhlError, TokenResponse, UserType};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::auth::random_token;

/// Pending authorizations older than this are purged.
pub const STATE_TTL: Duration = Duration::from_secs(3600);

pub const CROSS_TENANT_MESSAGE: &str = "Account Cross-Breeding Not allowed";
pub const ALREADY_INSTALLED_MESSAGE: &str = "Sub-account Already Installed!";

#[derive(Debug, Error)]
pub enum BrokerError {
    /// No refresh token is stored for the credential.
    #[error("{0} is not connected to the CRM")]
    NotConnected(String),

    /// The CRM refused the stored refresh token. The user must reconnect.
    #[error("CRM refused the stored credentials ({status}): {message}. Reconnect the integration.")]
    Rejected { status: u16, message: String },

    #[error("Invalid or expired authorization state")]
    InvalidState,

    #[error("{}", CROSS_TENANT_MESSAGE)]
    CrossTenant,

    #[error("{}", ALREADY_INSTALLED_MESSAGE)]
    AlreadyInstalled,

    /// The CRM authorized a different location than the one requested.
    #[error("Authorized location {got} does not match requested {expected}")]
    LocationMismatch { expected: String, got: String },

    #[error(transparent)]
    Crm(GhlError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<GhlError> for BrokerError {
    fn from(err: GhlError) -> Self {
        match err {
            GhlError::TokenRejected { status, message } => BrokerError::Rejected { status, message },
            other => BrokerError::Crm(other),
        }
    }
}

/// A fresh agency access token and the agency it belongs to.
#[derive(Debug, Clone)]
pub struct AgencyToken {
    pub access_token: String,
    pub company_id: String,
}

type RefreshLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

fn lock_map(locks: &RefreshLocks) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
    match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Held for the length of one refresh. Dropping the last holder of a
/// credential's lock removes its entry, so the map only tracks refreshes
/// in flight.
struct RefreshGuard<'a> {
    locks: &'a RefreshLocks,
    key: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut locks = lock_map(self.locks);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

pub struct TokenBroker {
    pool: SqlitePool,
    ghl: GhlClient,
    refresh_locks: RefreshLocks,
}

impl TokenBroker {
    pub fn new(pool: SqlitePool, ghl: GhlClient) -> Self {
        Self {
            pool,
            ghl,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ghl(&self) -> &GhlClient {
        &self.ghl
    }

    async fn refresh_lock(&self, key: String) -> RefreshGuard<'_> {
        let lock = lock_map(&self.refresh_locks)
            .entry(key.clone())
            .or_default()
            .clone();
        RefreshGuard {
            locks: &self.refresh_locks,
            key,
            held: Some(lock.lock_owned().await),
        }
    }

    /// Agency-level access token. Persists the rotated refresh token first.
    pub async fn agency_token(&self, user_id: &str) -> Result<AgencyToken, BrokerError> {
        let _guard = self.refresh_lock(format!("agency:{}", user_id)).await;

        let owner = user::get_user(&self.pool, user_id).await?;
        let refresh = owner
            .ghl_refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BrokerError::NotConnected("Agency account".to_string()))?;

        let tokens = self.ghl.refresh_token(&refresh, UserType::Company).await?;
        user::store_ghl_tokens(&self.pool, user_id, &tokens.refresh_token, tokens.expires_in).await?;
        debug!(user_id, "Rotated agency CRM token");

        let company_id = tokens
            .company_id
            .or(owner.ghl_company_id)
            .ok_or_else(|| BrokerError::NotConnected("Agency account".to_string()))?;
        Ok(AgencyToken {
            access_token: tokens.access_token,
            company_id,
        })
    }

    /// Sub-account access token. Persists the rotated refresh token first.
    pub async fn location_token(&self, user_id: &str, account_id: &str) -> Result<String, BrokerError> {
        let _guard = self
            .refresh_lock(format!("location:{}:{}", user_id, account_id))
            .await;

        let sub = sub_account::get_connected_sub_account(&self.pool, user_id, account_id).await?;
        let refresh = sub
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BrokerError::NotConnected(format!("Sub-account {}", account_id)))?;

        let tokens = self.ghl.refresh_token(&refresh, UserType::Location).await?;
        sub_account::store_sub_account_tokens(
            &self.pool,
            user_id,
            account_id,
            &tokens.refresh_token,
            tokens.expires_in,
        )
        .await?;
        debug!(user_id, account_id, "Rotated sub-account CRM token");
        Ok(tokens.access_token)
    }

    /// Start an authorization: purge stale states, store a new one.
    pub async fn begin_authorization(
        &self,
        user_id: &str,
        provider: &str,
        account_id: Option<&str>,
    ) -> Result<String, BrokerError> {
        match oauth_state::purge_older_than(&self.pool, STATE_TTL).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged stale OAuth states"),
            Err(e) => warn!(error = %e, "Failed to purge stale OAuth states"),
        }

        let state = random_token();
        oauth_state::create_state(&self.pool, &state, user_id, provider, account_id).await?;
        Ok(state)
    }

    /// Consume a callback's state. A state verifies exactly once.
    pub async fn finish_authorization(&self, state: &str, provider: &str) -> Result<OAuthState, BrokerError> {
        oauth_state::take_state(&self.pool, state, provider)
            .await?
            .ok_or(BrokerError::InvalidState)
    }

    /// Exchange an agency authorization code and pin the agency.
    pub async fn connect_agency(&self, user_id: &str, code: &str, redirect_uri: &str) -> Result<(), BrokerError> {
        let tokens = self.ghl.exchange_code(code, redirect_uri, UserType::Company).await?;
        let company_id = tokens
            .company_id
            .clone()
            .ok_or_else(|| BrokerError::NotConnected("Authorized account has no agency".to_string()))?;

        self.pin_company(user_id, &company_id).await?;
        user::store_ghl_tokens(&self.pool, user_id, &tokens.refresh_token, tokens.expires_in).await?;
        info!(user_id, %company_id, "Agency CRM connected");
        Ok(())
    }

    /// Exchange a sub-account authorization code for the requested location.
    pub async fn connect_location(
        &self,
        user_id: &str,
        account_id: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<(), BrokerError> {
        let tokens = self.ghl.exchange_code(code, redirect_uri, UserType::Location).await?;
        if let Some(got) = tokens.location_id.as_deref() {
            if got != account_id {
                return Err(BrokerError::LocationMismatch {
                    expected: account_id.to_string(),
                    got: got.to_string(),
                });
            }
        }
        if let Some(company_id) = tokens.company_id.as_deref() {
            self.pin_company(user_id, company_id).await?;
        }
        self.store_location(user_id, account_id, &tokens).await
    }

    /// Import a sub-account through the agency token.
    ///
    /// Fails with [`BrokerError::AlreadyInstalled`] before any vendor call
    /// when the sub-account is already connected.
    pub async fn import_location(&self, user_id: &str, account_id: &str) -> Result<(), BrokerError> {
        if let Some(existing) = sub_account::find_sub_account(&self.pool, user_id, account_id).await? {
            if existing.connected {
                return Err(BrokerError::AlreadyInstalled);
            }
        }

        let agency = self.agency_token(user_id).await?;
        let tokens = self
            .ghl
            .location_token(&agency.access_token, &agency.company_id, account_id)
            .await?;
        self.store_location(user_id, account_id, &tokens).await
    }

    async fn store_location(
        &self,
        user_id: &str,
        account_id: &str,
        tokens: &TokenResponse,
    ) -> Result<(), BrokerError> {
        let existing = sub_account::find_sub_account(&self.pool, user_id, account_id).await?;
        if let Some(sub) = existing.filter(|s| s.connected) {
            sub_account::store_sub_account_tokens(
                &self.pool,
                user_id,
                &sub.account_id,
                &tokens.refresh_token,
                tokens.expires_in,
            )
            .await?;
            info!(user_id, account_id, "Sub-account reauthorized");
            return Ok(());
        }

        let name = match self.ghl.get_location(&tokens.access_token, account_id).await {
            Ok(location) if !location.name.is_empty() => location.name,
            Ok(_) => account_id.to_string(),
            Err(e) => {
                warn!(account_id, error = %e, "Could not read location name");
                account_id.to_string()
            }
        };
        sub_account::import_sub_account(
            &self.pool,
            user_id,
            account_id,
            &name,
            &tokens.refresh_token,
            tokens.expires_in,
        )
        .await
        .map_err(|e| match e {
            DatabaseError::AlreadyExists { .. } => BrokerError::AlreadyInstalled,
            other => other.into(),
        })?;
        info!(user_id, account_id, "Sub-account imported");
        Ok(())
    }

    async fn pin_company(&self, user_id: &str, company_id: &str) -> Result<(), BrokerError> {
        match user::pin_ghl_company(&self.pool, user_id, company_id).await? {
            CompanyPin::Pinned | CompanyPin::Matches => Ok(()),
            CompanyPin::Mismatch => {
                warn!(user_id, company_id, "Rejected connection to a second agency");
                Err(BrokerError::CrossTenant)
            }
        }
    }
}

#[async_trait]
impl TokenSource for TokenBroker {
    async fn location_token(&self, user_id: &str, account_id: &str) -> Result<String, ToolError> {
        TokenBroker::location_token(self, user_id, account_id)
            .await
            .map_err(|e| ToolError::Token(e.to_string()))
    }
}
