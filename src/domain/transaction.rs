//! Transaction domain entity.
//! Framework-agnostic representation of one matched sharing deal.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::settlement::{calculate, Settlement};

/// Sentinel identity used when no remote auth backend is configured.
pub const GUEST_ACTOR_ID: &str = "current-user";

/// Identifier of a party (seeker or supporter).
///
/// Backend-issued ids are UUIDs; the offline/demo identity uses the
/// [`GUEST_ACTOR_ID`] sentinel, which is never a valid backend id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn guest() -> Self {
        Self(GUEST_ACTOR_ID.to_string())
    }

    pub fn is_guest(&self) -> bool {
        self.0 == GUEST_ACTOR_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for ActorId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle state of a transaction.
///
/// The string values are persisted verbatim and must stay stable for
/// interoperability with existing stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    #[serde(rename = "waiting-supporter")]
    WaitingSupporter,
    #[serde(rename = "waiting-cash-payment")]
    WaitingCashPayment,
    #[serde(rename = "cash-paid")]
    CashPaid,
    #[serde(rename = "qr-uploaded")]
    QrUploaded,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "dismissed")]
    Dismissed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::WaitingSupporter => "waiting-supporter",
            TxStatus::WaitingCashPayment => "waiting-cash-payment",
            TxStatus::CashPaid => "cash-paid",
            TxStatus::QrUploaded => "qr-uploaded",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
            TxStatus::Cancelled => "cancelled",
            TxStatus::Dismissed => "dismissed",
        }
    }

    /// Terminal with respect to the shared record's business meaning.
    /// `Dismissed` only exists as a cleanup state after both parties dismissed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::Completed | TxStatus::Failed | TxStatus::Cancelled | TxStatus::Dismissed
        )
    }

    /// States in which the record still binds both parties to an outcome.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting-supporter" => Ok(TxStatus::WaitingSupporter),
            "waiting-cash-payment" => Ok(TxStatus::WaitingCashPayment),
            "cash-paid" => Ok(TxStatus::CashPaid),
            "qr-uploaded" => Ok(TxStatus::QrUploaded),
            "completed" => Ok(TxStatus::Completed),
            "failed" => Ok(TxStatus::Failed),
            "cancelled" => Ok(TxStatus::Cancelled),
            "dismissed" => Ok(TxStatus::Dismissed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// How much of the bill the supporter covers. A closed two-value set,
/// not a continuous parameter, despite the numeric wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SupportPercentage {
    /// Supporter subsidizes 20%; the seeker reimburses the rest in cash.
    Partial,
    /// Supporter gifts the full bill.
    Full,
}

impl SupportPercentage {
    pub fn as_u8(&self) -> u8 {
        match self {
            SupportPercentage::Partial => 20,
            SupportPercentage::Full => 100,
        }
    }
}

impl From<SupportPercentage> for u8 {
    fn from(pct: SupportPercentage) -> u8 {
        pct.as_u8()
    }
}

impl TryFrom<u8> for SupportPercentage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            20 => Ok(SupportPercentage::Partial),
            100 => Ok(SupportPercentage::Full),
            other => Err(format!("support percentage must be 20 or 100, got {other}")),
        }
    }
}

impl fmt::Display for SupportPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Which side of the deal an actor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Seeker,
    Supporter,
}

/// Domain entity representing one sharing transaction.
///
/// `seeker_name`/`supporter_name` are display-only, resolved from a separate
/// profile lookup and never persisted with the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub seeker_id: ActorId,
    pub supporter_id: Option<ActorId>,
    pub amount: BigDecimal,
    pub listing_title: String,
    pub status: TxStatus,
    pub support_percentage: SupportPercentage,
    pub qr_url: Option<String>,
    pub qr_uploaded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub dismissed_by_seeker: bool,
    pub dismissed_by_supporter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporter_name: Option<String>,
}

impl Transaction {
    /// New transaction in the initial state. The id is provisional; a
    /// backend-backed store replaces it with the server-assigned one.
    pub fn new(seeker_id: ActorId, amount: BigDecimal, listing_title: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            seeker_id,
            supporter_id: None,
            amount,
            listing_title,
            status: TxStatus::WaitingSupporter,
            support_percentage: SupportPercentage::Partial,
            qr_url: None,
            qr_uploaded_at: None,
            completed_at: None,
            created_at: Utc::now(),
            dismissed_by_seeker: false,
            dismissed_by_supporter: false,
            seeker_name: None,
            supporter_name: None,
        }
    }

    /// Derived monetary figures, always recomputed from the current
    /// `amount` and `support_percentage` so corrections can never leave
    /// stale cached values behind.
    pub fn amounts(&self) -> Settlement {
        calculate(&self.amount, self.support_percentage)
    }

    /// Which side of the deal `actor` is on, if any.
    pub fn party_of(&self, actor: &ActorId) -> Option<Party> {
        if &self.seeker_id == actor {
            Some(Party::Seeker)
        } else if self.supporter_id.as_ref() == Some(actor) {
            Some(Party::Supporter)
        } else {
            None
        }
    }

    pub fn is_party(&self, actor: &ActorId) -> bool {
        self.party_of(actor).is_some()
    }

    /// Whether `actor` has archived this record from their own view.
    pub fn dismissed_by(&self, actor: &ActorId) -> bool {
        match self.party_of(actor) {
            Some(Party::Seeker) => self.dismissed_by_seeker,
            Some(Party::Supporter) => self.dismissed_by_supporter,
            None => false,
        }
    }

    /// Active from `actor`'s perspective: non-terminal status, or a terminal
    /// outcome this actor has not yet dismissed.
    pub fn is_active_for(&self, actor: &ActorId) -> bool {
        if self.status == TxStatus::Dismissed || self.status == TxStatus::Cancelled {
            return false;
        }
        self.status.is_active() || !self.dismissed_by(actor)
    }
}
