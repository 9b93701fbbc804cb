//! Actor identity providers.
//!
//! The REST provider asks the hosted auth service who is signed in, capped by
//! a timeout; when the lookup hangs or fails it falls back to the cached
//! session identity instead of blocking the caller. The local provider backs
//! offline/demo mode with the guest sentinel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::domain::{ActorId, UserProfile, Wallet};
use crate::ports::{IdentityProvider, StoreError, StoreResult};
use crate::session::Session;

pub struct RestIdentityProvider {
    client: Client,
    base_url: Url,
    anon_key: String,
    auth_timeout: Duration,
    session: Arc<Session>,
}

impl RestIdentityProvider {
    pub fn new(
        base_url: Url,
        anon_key: String,
        auth_timeout: Duration,
        session: Arc<Session>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            anon_key,
            auth_timeout,
            session,
        }
    }

    pub fn from_config(config: &Config, session: Arc<Session>) -> Option<Self> {
        Some(Self::new(
            config.backend_url.clone()?,
            config.backend_anon_key.clone()?,
            config.auth_timeout(),
            session,
        ))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Locally cached identity, used when the auth service cannot answer in
    /// time. The guest sentinel never counts as a signed-in remote actor.
    fn cached_actor(&self) -> Option<ActorId> {
        let profile = self.session.profile();
        (!profile.id.is_guest()).then_some(profile.id)
    }

    async fn remote_actor(&self) -> StoreResult<Option<ActorId>> {
        let response = self
            .client
            .get(self.endpoint("/auth/v1/user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", &self.anon_key))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "auth service answered {}",
                response.status()
            )));
        }

        let user = response
            .json::<AuthUser>()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Some(ActorId::new(user.id)))
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn current_actor(&self) -> StoreResult<Option<ActorId>> {
        match tokio::time::timeout(self.auth_timeout, self.remote_actor()).await {
            Ok(Ok(actor)) => Ok(actor),
            Ok(Err(err)) => match self.cached_actor() {
                Some(actor) => {
                    tracing::warn!(error = %err, "auth lookup failed, using cached identity");
                    Ok(Some(actor))
                }
                None => Err(err),
            },
            Err(_) => match self.cached_actor() {
                Some(actor) => {
                    tracing::warn!("auth lookup timed out, using cached identity");
                    Ok(Some(actor))
                }
                None => Err(StoreError::Timeout),
            },
        }
    }

    async fn profile(&self, id: &ActorId) -> StoreResult<Option<UserProfile>> {
        let url = format!(
            "{}?id=eq.{id}&limit=1",
            self.endpoint("/rest/v1/profiles")
        );
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", &self.anon_key))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "profile lookup answered {}",
                response.status()
            )));
        }

        let rows = response
            .json::<Vec<ProfileRow>>()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(rows.into_iter().next().map(ProfileRow::into_domain))
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    full_name: Option<String>,
    #[serde(default)]
    referral_code: Option<String>,
    #[serde(default)]
    referred_by: Option<String>,
    #[serde(default)]
    wallet_balance: Option<BigDecimal>,
}

impl ProfileRow {
    fn into_domain(self) -> UserProfile {
        UserProfile {
            id: ActorId::new(self.id),
            full_name: self.full_name.unwrap_or_default(),
            referral_code: self.referral_code.unwrap_or_default(),
            referred_by: self.referred_by.map(ActorId::new),
            wallet: Wallet {
                balance: self.wallet_balance.unwrap_or_else(|| BigDecimal::from(0)),
                ..Wallet::default()
            },
        }
    }
}

/// Offline/demo identity: whatever the session holds, or the guest profile.
pub struct LocalIdentityProvider {
    session: Arc<Session>,
}

impl LocalIdentityProvider {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn current_actor(&self) -> StoreResult<Option<ActorId>> {
        Ok(Some(self.session.profile().id))
    }

    async fn profile(&self, id: &ActorId) -> StoreResult<Option<UserProfile>> {
        let profile = self.session.profile();
        Ok((&profile.id == id).then_some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Arc<Session> {
        let dir = tempfile::tempdir().unwrap();
        // keep the tempdir alive by leaking it into the path; tests only read
        let path = dir.into_path().join("session.json");
        Arc::new(Session::load(path))
    }

    #[tokio::test]
    async fn local_provider_defaults_to_guest() {
        let provider = LocalIdentityProvider::new(session());
        let actor = provider.current_actor().await.unwrap().unwrap();
        assert!(actor.is_guest());
    }

    #[tokio::test]
    async fn rest_provider_parses_signed_in_user() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/auth/v1/user")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "aaaa1111-0000-0000-0000-000000000001"}"#)
            .create_async()
            .await;

        let provider = RestIdentityProvider::new(
            Url::parse(&server.url()).unwrap(),
            "anon-key".into(),
            Duration::from_secs(2),
            session(),
        );
        let actor = provider.current_actor().await.unwrap().unwrap();
        assert_eq!(actor.as_str(), "aaaa1111-0000-0000-0000-000000000001");
    }

    #[tokio::test]
    async fn rest_provider_treats_unauthorized_as_signed_out() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/auth/v1/user")
            .with_status(401)
            .create_async()
            .await;

        let provider = RestIdentityProvider::new(
            Url::parse(&server.url()).unwrap(),
            "anon-key".into(),
            Duration::from_secs(2),
            session(),
        );
        assert!(provider.current_actor().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rest_provider_falls_back_to_cached_identity() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/auth/v1/user")
            .with_status(500)
            .create_async()
            .await;

        let cached = session();
        let mut profile = UserProfile::guest();
        profile.id = ActorId::new("bbbb2222-0000-0000-0000-000000000002");
        cached.set_profile(profile).unwrap();

        let provider = RestIdentityProvider::new(
            Url::parse(&server.url()).unwrap(),
            "anon-key".into(),
            Duration::from_secs(2),
            cached,
        );
        let actor = provider.current_actor().await.unwrap().unwrap();
        assert_eq!(actor.as_str(), "bbbb2222-0000-0000-0000-000000000002");
    }
}
