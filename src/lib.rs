pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod session;
pub mod validation;

use std::sync::Arc;

use crate::adapters::{
    InlineQrStorage, LocalIdentityProvider, LocalRewardLedger, MemoryStore, RestIdentityProvider,
    RestQrStorage, RestStore,
};
use crate::config::Config;
use crate::domain::ActorId;
use crate::engine::TransactionEngine;
use crate::error::AppError;
use crate::ports::{IdentityProvider, QrStorage};
use crate::session::Session;

/// Everything a caller needs wired together. With a configured backend the
/// hosted adapters are used; otherwise the whole stack runs locally against
/// the in-memory store and the guest identity.
pub struct AppContext {
    pub config: Config,
    pub session: Arc<Session>,
    pub engine: Arc<TransactionEngine>,
    pub identity: Arc<dyn IdentityProvider>,
    pub qr_storage: Arc<dyn QrStorage>,
}

impl AppContext {
    pub fn from_config(config: Config) -> Self {
        let session = Arc::new(Session::load(config.session_path.clone()));
        let rewards = Arc::new(LocalRewardLedger::new(Arc::clone(&session)));

        let (store, identity, qr_storage): (
            Arc<dyn ports::TransactionStore>,
            Arc<dyn IdentityProvider>,
            Arc<dyn QrStorage>,
        ) = match (
            RestStore::from_config(&config),
            RestIdentityProvider::from_config(&config, Arc::clone(&session)),
            RestQrStorage::from_config(&config),
        ) {
            (Some(store), Some(identity), Some(storage)) => {
                tracing::info!("running against the hosted backend");
                (Arc::new(store), Arc::new(identity), Arc::new(storage))
            }
            _ => {
                tracing::info!("no backend configured, running locally");
                (
                    Arc::new(MemoryStore::new()),
                    Arc::new(LocalIdentityProvider::new(Arc::clone(&session))),
                    Arc::new(InlineQrStorage::new()),
                )
            }
        };

        let engine = Arc::new(TransactionEngine::new(store, rewards, config.clone()));
        Self {
            config,
            session,
            engine,
            identity,
            qr_storage,
        }
    }

    /// The acting identity, or [`AppError::NotSignedIn`] when the hosted
    /// backend is configured but nobody is signed in.
    pub async fn current_actor(&self) -> Result<ActorId, AppError> {
        self.identity
            .current_actor()
            .await?
            .ok_or(AppError::NotSignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_context_runs_as_guest() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.session_path = dir.path().join("session.json");

        let ctx = AppContext::from_config(config);
        let actor = ctx.current_actor().await.unwrap();
        assert!(actor.is_guest());
    }
}
