//! Attestation type and source ledger identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AttestationError;

/// Attestation types understood by the oracle network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum AttestationType {
    /// A payment from one address to another.
    Payment = 1,
    /// A transaction that decreased the balance of an address.
    BalanceDecreasingTransaction = 2,
    /// A block at a given height exists and is confirmed.
    ConfirmedBlockHeightExists = 3,
    /// No payment with a given reference reached an address before a deadline.
    ReferencedPaymentNonexistence = 4,
}

impl AttestationType {
    /// All attestation types in id order.
    pub const ALL: [Self; 4] = [
        Self::Payment,
        Self::BalanceDecreasingTransaction,
        Self::ConfirmedBlockHeightExists,
        Self::ReferencedPaymentNonexistence,
    ];

    /// Numeric id used on the wire.
    pub const fn id(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for AttestationType {
    type Error = AttestationError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == id)
            .ok_or(AttestationError::UnsupportedAttestationType { id })
    }
}

impl From<AttestationType> for u16 {
    fn from(value: AttestationType) -> Self {
        value.id()
    }
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Payment => "Payment",
            Self::BalanceDecreasingTransaction => "BalanceDecreasingTransaction",
            Self::ConfirmedBlockHeightExists => "ConfirmedBlockHeightExists",
            Self::ReferencedPaymentNonexistence => "ReferencedPaymentNonexistence",
        };
        f.write_str(name)
    }
}

/// Source ledgers facts can be attested about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum SourceId {
    /// Bitcoin.
    Btc = 0,
    /// Litecoin.
    Ltc = 1,
    /// Dogecoin.
    Doge = 2,
    /// XRP Ledger.
    Xrp = 3,
    /// Algorand.
    Algo = 4,
}

impl SourceId {
    /// All known sources in id order.
    pub const ALL: [Self; 5] = [Self::Btc, Self::Ltc, Self::Doge, Self::Xrp, Self::Algo];

    /// Numeric id used on the wire.
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Look up a source by id.
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }
}

impl TryFrom<u32> for SourceId {
    type Error = String;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or_else(|| format!("unknown source id {id}"))
    }
}

impl From<SourceId> for u32 {
    fn from(value: SourceId) -> Self {
        value.id()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Btc => "BTC",
            Self::Ltc => "LTC",
            Self::Doge => "DOGE",
            Self::Xrp => "XRP",
            Self::Algo => "ALGO",
        };
        f.write_str(name)
    }
}
