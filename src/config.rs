use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use serde::Deserialize;
use url::Url;

/// Runtime configuration, read once from the environment.
///
/// The hosted backend is optional: without `BACKEND_URL`/`BACKEND_ANON_KEY`
/// the crate runs in offline/demo mode against the in-memory store and the
/// guest identity.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub backend_url: Option<Url>,
    pub backend_anon_key: Option<String>,
    /// Cap on any persistence/storage request.
    pub request_timeout_secs: u64,
    /// Cap on the auth lookup before falling back to the cached identity.
    pub auth_timeout_secs: u64,
    /// Poll interval for the authoritative record, the fallback convergence
    /// channel when push updates are delayed or unsupported.
    pub poll_interval_secs: u64,
    /// Soft validity window of an uploaded QR proof.
    pub qr_validity_secs: u64,
    /// Whether an expired QR window reports failure automatically instead of
    /// waiting for an explicit party action.
    pub qr_expiry_fails: bool,
    /// Where the session cache lives.
    pub session_path: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let backend_url = match env::var("BACKEND_URL") {
            Ok(raw) if is_real_backend_url(&raw) => Some(raw.parse::<Url>()?),
            _ => None,
        };

        Ok(Config {
            backend_url,
            backend_anon_key: env::var("BACKEND_ANON_KEY").ok().filter(|k| !k.is_empty()),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 8)?,
            auth_timeout_secs: env_or("AUTH_TIMEOUT_SECS", 5)?,
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", 4)?,
            qr_validity_secs: env_or("QR_VALIDITY_SECS", 300)?,
            qr_expiry_fails: env::var("QR_EXPIRY_FAILS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            session_path: env::var("SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".workigom/session.json")),
        })
    }

    /// Both the URL and the anon key must be present for remote mode.
    pub fn is_backend_configured(&self) -> bool {
        self.backend_url.is_some() && self.backend_anon_key.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn qr_validity(&self) -> Duration {
        Duration::from_secs(self.qr_validity_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_anon_key: None,
            request_timeout_secs: 8,
            auth_timeout_secs: 5,
            poll_interval_secs: 4,
            qr_validity_secs: 300,
            qr_expiry_fails: false,
            session_path: PathBuf::from(".workigom/session.json"),
        }
    }
}

fn is_real_backend_url(raw: &str) -> bool {
    !raw.is_empty()
        && !raw.contains("placeholder")
        && (raw.starts_with("http://") || raw.starts_with("https://"))
}

fn env_or(key: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(key) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_urls_do_not_count_as_configured() {
        assert!(!is_real_backend_url("https://placeholder.backend.co"));
        assert!(!is_real_backend_url(""));
        assert!(!is_real_backend_url("ftp://somewhere"));
        assert!(is_real_backend_url("https://project.supabase.co"));
    }

    #[test]
    fn defaults_match_observed_values() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(8));
        assert_eq!(config.auth_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Duration::from_secs(4));
        assert_eq!(config.qr_validity(), Duration::from_secs(300));
        assert!(!config.qr_expiry_fails);
        assert!(!config.is_backend_configured());
    }
}
