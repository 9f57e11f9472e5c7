use crate::error::{Result, WagerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MAX_ADDRESS_LEN: usize = 64;

/// Account identity. Both players and contracts are addressed this way.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_ADDRESS_LEN {
            return Err(WagerError::InvalidAddress(raw));
        }

        let valid = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
        if !valid {
            return Err(WagerError::InvalidAddress(raw));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = WagerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = WagerError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Currency amount in the smallest unit (mutez).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_mutez(mutez: u64) -> Self {
        Self(mutez)
    }

    pub const fn to_mutez(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Addition that reports overflow as a protocol error.
    pub fn try_add(self, rhs: Amount) -> Result<Amount> {
        self.checked_add(rhs).ok_or(WagerError::ArithmeticOverflow)
    }

    /// Subtraction that reports a shortfall as insufficient balance.
    pub fn try_sub(self, rhs: Amount) -> Result<Amount> {
        self.checked_sub(rhs)
            .ok_or(WagerError::InsufficientBalance {
                need: rhs.0,
                available: self.0,
            })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mutez", self.0)
    }
}

/// Identifies a bet held between the ledger debit and the escrow's acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the host tells a component about the call it is executing.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub sender: Address,
    /// Value attached to the call, already credited to the callee.
    pub amount: Amount,
    /// The callee's own native balance, including `amount`.
    pub balance: Amount,
    pub now: DateTime<Utc>,
}

impl CallContext {
    pub fn new(sender: Address, amount: Amount, balance: Amount, now: DateTime<Utc>) -> Self {
        Self {
            sender,
            amount,
            balance,
            now,
        }
    }

    /// Refuse value on an entrypoint that has no use for it.
    pub fn reject_value(&self, operation: &str) -> Result<()> {
        if !self.amount.is_zero() {
            return Err(WagerError::invalid_amount(format!(
                "{} does not accept value, {} attached",
                operation, self.amount
            )));
        }
        Ok(())
    }
}
