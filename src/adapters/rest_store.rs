//! Hosted-backend implementation of [`TransactionStore`].
//!
//! Speaks the backend's PostgREST-style row API over HTTP. All monetary and
//! status fields travel in the exact wire shapes existing stored data uses
//! (snake_case columns, kebab-case status strings, numeric percentage).
//! Realtime push is not carried over this surface; `subscribe` reports
//! unsupported and consumers converge through polling.

use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{format_name, ActorId, SupportPercentage, Transaction, TxStatus};
use crate::ports::{StoreError, StoreResult, TransactionPatch, TransactionStore};

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

const SELECT_WITH_NAMES: &str = "*,seeker:seeker_id(full_name),supporter:supporter_id(full_name)";

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: Url,
    anon_key: String,
    circuit_breaker: Breaker,
}

impl RestStore {
    pub fn new(base_url: Url, anon_key: String, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(30), Duration::from_secs(60));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        Self {
            client,
            base_url,
            anon_key,
            circuit_breaker,
        }
    }

    pub fn from_config(config: &Config) -> Option<Self> {
        let base_url = config.backend_url.clone()?;
        let anon_key = config.backend_anon_key.clone()?;
        Some(Self::new(base_url, anon_key, config.request_timeout()))
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/transactions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    async fn run<T, F>(&self, request: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        match self.circuit_breaker.call(request).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => {
                Err(StoreError::Request("backend circuit breaker is open".into()))
            }
            Err(FailsafeError::Inner(err)) => Err(err),
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", &self.anon_key))
    }

    async fn rows_from(response: reqwest::Response) -> StoreResult<Vec<TransactionRow>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Request(format!("backend answered {status}: {body}")));
        }
        response
            .json::<Vec<TransactionRow>>()
            .await
            .map_err(map_reqwest_err)
    }
}

fn map_reqwest_err(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Request(err.to_string())
    }
}

#[async_trait]
impl TransactionStore for RestStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let url = self.table_url();
        let body = NewTransactionRow::from_domain(tx);
        let request = async {
            let response = self
                .authed(self.client.post(&url))
                .header("Prefer", "return=representation")
                .json(&body)
                .send()
                .await
                .map_err(map_reqwest_err)?;
            let rows = Self::rows_from(response).await?;
            rows.into_iter()
                .next()
                .map(TransactionRow::into_domain)
                .ok_or_else(|| StoreError::Request("insert returned no row".into()))
        };
        self.run(request).await
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Transaction> {
        let url = format!(
            "{}?id=eq.{id}&select={SELECT_WITH_NAMES}&limit=1",
            self.table_url()
        );
        let request = async {
            let response = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(map_reqwest_err)?;
            let rows = Self::rows_from(response).await?;
            rows.into_iter()
                .next()
                .map(TransactionRow::into_domain)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        };
        self.run(request).await
    }

    async fn update(
        &self,
        id: Uuid,
        expected: Option<TxStatus>,
        patch: TransactionPatch,
    ) -> StoreResult<Transaction> {
        let mut url = format!("{}?id=eq.{id}", self.table_url());
        if let Some(expected) = expected {
            // the row filter is the atomic guard: zero rows patched means
            // somebody else won the transition
            url.push_str(&format!("&status=eq.{}", expected.as_str()));
        }
        let body = patch_to_json(&patch);
        let request = async {
            let response = self
                .authed(self.client.patch(&url))
                .header("Prefer", "return=representation")
                .json(&body)
                .send()
                .await
                .map_err(map_reqwest_err)?;
            let rows = Self::rows_from(response).await?;
            rows.into_iter()
                .next()
                .map(TransactionRow::into_domain)
                .ok_or_else(|| {
                    StoreError::Conflict(format!("no row matched id {id} in the expected status"))
                })
        };
        self.run(request).await
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        let url = format!("{}?id=eq.{id}", self.table_url());
        let request = async {
            let response = self
                .authed(self.client.delete(&url))
                .send()
                .await
                .map_err(map_reqwest_err)?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Request(format!("backend answered {status}: {body}")))
            }
        };
        self.run(request).await
    }

    async fn find_active_for(&self, actor: &ActorId) -> StoreResult<Option<Transaction>> {
        let url = format!(
            "{}?or=(seeker_id.eq.{actor},supporter_id.eq.{actor})\
             &status=not.in.(dismissed,cancelled)\
             &select={SELECT_WITH_NAMES}&order=created_at.desc&limit=1",
            self.table_url()
        );
        let request = async {
            let response = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(map_reqwest_err)?;
            let rows = Self::rows_from(response).await?;
            Ok(rows.into_iter().next().map(TransactionRow::into_domain))
        };
        let found: Option<Transaction> = self.run(request).await?;
        // per-actor dismissal is filtered here; the row filter only knows the
        // shared status
        Ok(found.filter(|tx| tx.is_active_for(actor)))
    }

    async fn list_open(&self) -> StoreResult<Vec<Transaction>> {
        let url = format!(
            "{}?status=eq.waiting-supporter&select={SELECT_WITH_NAMES}&order=created_at.desc",
            self.table_url()
        );
        let request = async {
            let response = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(map_reqwest_err)?;
            let rows = Self::rows_from(response).await?;
            Ok(rows.into_iter().map(TransactionRow::into_domain).collect())
        };
        self.run(request).await
    }

    async fn subscribe(&self, _id: Uuid) -> StoreResult<broadcast::Receiver<Transaction>> {
        // push is delivered out-of-band by the hosted realtime service;
        // this surface only offers polling
        Err(StoreError::NotConfigured)
    }
}

/// Internal row type mirroring the backend table. Not exposed outside the
/// adapter.
#[derive(Debug, Serialize, Deserialize)]
struct TransactionRow {
    id: Uuid,
    seeker_id: String,
    supporter_id: Option<String>,
    amount: BigDecimal,
    #[serde(default)]
    listing_title: String,
    status: TxStatus,
    support_percentage: SupportPercentage,
    qr_url: Option<String>,
    qr_uploaded_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    dismissed_by_seeker: bool,
    #[serde(default)]
    dismissed_by_supporter: bool,
    #[serde(default, skip_serializing)]
    seeker: Option<ProfileJoin>,
    #[serde(default, skip_serializing)]
    supporter: Option<ProfileJoin>,
}

#[derive(Debug, Deserialize)]
struct ProfileJoin {
    full_name: Option<String>,
}

impl TransactionRow {
    fn into_domain(self) -> Transaction {
        Transaction {
            id: self.id,
            seeker_id: ActorId::new(self.seeker_id),
            supporter_id: self.supporter_id.map(ActorId::new),
            amount: self.amount,
            listing_title: self.listing_title,
            status: self.status,
            support_percentage: self.support_percentage,
            qr_url: self.qr_url,
            qr_uploaded_at: self.qr_uploaded_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            dismissed_by_seeker: self.dismissed_by_seeker,
            dismissed_by_supporter: self.dismissed_by_supporter,
            seeker_name: self
                .seeker
                .and_then(|p| p.full_name)
                .map(|name| format_name(&name)),
            supporter_name: self
                .supporter
                .and_then(|p| p.full_name)
                .map(|name| format_name(&name)),
        }
    }
}

/// Insert payload: the backend assigns id and created_at.
#[derive(Debug, Serialize)]
struct NewTransactionRow {
    seeker_id: String,
    amount: BigDecimal,
    listing_title: String,
    status: TxStatus,
    support_percentage: SupportPercentage,
}

impl NewTransactionRow {
    fn from_domain(tx: &Transaction) -> Self {
        Self {
            seeker_id: tx.seeker_id.as_str().to_string(),
            amount: tx.amount.clone(),
            listing_title: tx.listing_title.clone(),
            status: tx.status,
            support_percentage: tx.support_percentage,
        }
    }
}

fn patch_to_json(patch: &TransactionPatch) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    if let Some(status) = patch.status {
        body.insert("status".into(), json!(status));
    }
    if let Some(supporter_id) = &patch.supporter_id {
        body.insert(
            "supporter_id".into(),
            match supporter_id {
                Some(actor) => json!(actor.as_str()),
                None => serde_json::Value::Null,
            },
        );
    }
    if let Some(pct) = patch.support_percentage {
        body.insert("support_percentage".into(), json!(pct));
    }
    if let Some(url) = &patch.qr_url {
        body.insert("qr_url".into(), json!(url));
    }
    if let Some(at) = patch.qr_uploaded_at {
        body.insert("qr_uploaded_at".into(), json!(at));
    }
    if let Some(at) = patch.completed_at {
        body.insert("completed_at".into(), json!(at));
    }
    if let Some(flag) = patch.dismissed_by_seeker {
        body.insert("dismissed_by_seeker".into(), json!(flag));
    }
    if let Some(flag) = patch.dismissed_by_supporter {
        body.insert("dismissed_by_supporter".into(), json!(flag));
    }
    serde_json::Value::Object(body)
}
