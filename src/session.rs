//! Explicit session cache.
//!
//! Holds the locally-known actor profile and at most one cached active
//! transaction, persisted as a small JSON file. Replaces the original
//! client's ambient "current active transaction" singleton with a value the
//! caller constructs and passes down.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::domain::{Transaction, UserProfile};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_tx: Option<Transaction>,
}

pub struct Session {
    path: PathBuf,
    data: RwLock<SessionData>,
}

impl Session {
    /// Load the cache from `path`; a missing or unreadable file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached profile, or the guest profile when nothing is cached.
    pub fn profile(&self) -> UserProfile {
        self.data
            .read()
            .expect("session lock poisoned")
            .profile
            .clone()
            .unwrap_or_else(UserProfile::guest)
    }

    pub fn set_profile(&self, profile: UserProfile) -> io::Result<()> {
        let snapshot = {
            let mut data = self.data.write().expect("session lock poisoned");
            data.profile = Some(profile);
            serde_json::to_string_pretty(&*data).expect("session serializes")
        };
        self.persist(&snapshot)
    }

    /// Mutate the cached profile in place and persist the result.
    pub fn update_profile(&self, update: impl FnOnce(&mut UserProfile)) -> io::Result<()> {
        let snapshot = {
            let mut data = self.data.write().expect("session lock poisoned");
            let mut profile = data.profile.clone().unwrap_or_else(UserProfile::guest);
            update(&mut profile);
            data.profile = Some(profile);
            serde_json::to_string_pretty(&*data).expect("session serializes")
        };
        self.persist(&snapshot)
    }

    pub fn active(&self) -> Option<Transaction> {
        self.data
            .read()
            .expect("session lock poisoned")
            .active_tx
            .clone()
    }

    pub fn save_active(&self, tx: &Transaction) -> io::Result<()> {
        let snapshot = {
            let mut data = self.data.write().expect("session lock poisoned");
            data.active_tx = Some(tx.clone());
            serde_json::to_string_pretty(&*data).expect("session serializes")
        };
        self.persist(&snapshot)
    }

    pub fn clear_active(&self) -> io::Result<()> {
        let snapshot = {
            let mut data = self.data.write().expect("session lock poisoned");
            data.active_tx = None;
            serde_json::to_string_pretty(&*data).expect("session serializes")
        };
        self.persist(&snapshot)
    }

    fn persist(&self, snapshot: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActorId;
    use bigdecimal::BigDecimal;

    fn temp_session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load(dir.path().join("session.json"));
        (dir, session)
    }

    #[test]
    fn empty_session_yields_guest_profile() {
        let (_dir, session) = temp_session();
        assert!(session.profile().id.is_guest());
        assert!(session.active().is_none());
    }

    #[test]
    fn active_transaction_survives_a_reload() {
        let (_dir, session) = temp_session();
        let tx = Transaction::new(ActorId::new("s1"), BigDecimal::from(100), "lunch".into());
        session.save_active(&tx).unwrap();

        let reloaded = Session::load(session.path().to_path_buf());
        assert_eq!(reloaded.active().unwrap().id, tx.id);

        reloaded.clear_active().unwrap();
        let again = Session::load(session.path().to_path_buf());
        assert!(again.active().is_none());
    }

    #[test]
    fn profile_updates_are_persisted() {
        let (_dir, session) = temp_session();
        session
            .update_profile(|profile| {
                profile.full_name = "Ayse Kaya".into();
                profile.wallet.total_earnings += BigDecimal::from(10);
            })
            .unwrap();

        let reloaded = Session::load(session.path().to_path_buf());
        let profile = reloaded.profile();
        assert_eq!(profile.full_name, "Ayse Kaya");
        assert_eq!(profile.wallet.total_earnings, BigDecimal::from(10));
    }

    #[test]
    fn corrupt_cache_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        let session = Session::load(&path);
        assert!(session.active().is_none());
    }
}
