//! User profile as the views consume it. Only the fields the core needs:
//! identity, display name, referral linkage and the reward wallet.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::transaction::ActorId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: BigDecimal,
    pub total_earnings: BigDecimal,
    pub pending_balance: BigDecimal,
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            balance: BigDecimal::from(0),
            total_earnings: BigDecimal::from(0),
            pending_balance: BigDecimal::from(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: ActorId,
    pub full_name: String,
    pub referral_code: String,
    /// Who invited this user, if anyone. Credited on completed deals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<ActorId>,
    #[serde(default)]
    pub wallet: Wallet,
}

impl UserProfile {
    /// Offline/demo profile keyed by the guest sentinel id.
    pub fn guest() -> Self {
        Self {
            id: ActorId::guest(),
            full_name: "Guest".to_string(),
            referral_code: "GUEST".to_string(),
            referred_by: None,
            wallet: Wallet::default(),
        }
    }

    pub fn display_name(&self) -> String {
        format_name(&self.full_name)
    }
}

/// Abbreviate a full name for display: first name plus last initial.
pub fn format_name(full_name: &str) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, .., last] => match last.chars().next() {
            Some(initial) => format!("{first} {initial}."),
            None => (*first).to_string(),
        },
    }
}
