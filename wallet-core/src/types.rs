//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Append-only transaction history

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Upper bound on any balance, in minor units (999,999,999.99)
const MAX_BALANCE_CENTS: i64 = 99_999_999_999;

/// Largest balance a wallet may hold
pub fn max_balance() -> Decimal {
    Decimal::new(MAX_BALANCE_CENTS, 2)
}

/// Round a monetary amount to 2 decimal places, half-up
///
/// Applied to every amount before range checks and persistence so that
/// stored balances never carry more precision than the currency supports.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Check that a balance lies within `[0, max_balance()]`
pub fn within_balance_range(balance: Decimal) -> bool {
    balance >= Decimal::ZERO && balance <= max_balance()
}

/// Validate and normalize a mutation amount
///
/// Rounds to 2 decimal places and requires the result to be strictly
/// positive and at most `max_balance()`. Returns the normalized amount.
pub fn validate_amount(amount: Decimal) -> crate::Result<Decimal> {
    let rounded = round2(amount);
    if rounded <= Decimal::ZERO || rounded > max_balance() {
        return Err(crate::Error::AmountOutOfRange(rounded));
    }
    Ok(rounded)
}

/// Validate and normalize an initial wallet balance
///
/// Like [`validate_amount`] but zero is allowed.
pub fn validate_initial_balance(amount: Decimal) -> crate::Result<Decimal> {
    let rounded = round2(amount);
    if !within_balance_range(rounded) {
        return Err(crate::Error::AmountOutOfRange(rounded));
    }
    Ok(rounded)
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Nigerian Naira
    NGN,
    /// Canadian Dollar
    CAD,
    /// Australian Dollar
    AUD,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::NGN => "NGN",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "NGN" => Some(Currency::NGN),
            "CAD" => Some(Currency::CAD),
            "AUD" => Some(Currency::AUD),
            _ => None,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A currency account holding a balance
///
/// Owned by the store; mutated only through `WalletManager` inside a
/// locked, atomic unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet ID (UUIDv4)
    pub id: Uuid,

    /// Account currency
    pub currency: Currency,

    /// Current balance (2 decimal places, within `[0, max_balance()]`)
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet stamped with the current time
    ///
    /// The balance must already be validated and rounded.
    pub fn new(currency: Currency, balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            currency,
            balance,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Ledger entry type
///
/// The sign of a balance change is implied by the kind; stored amounts
/// are always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TransactionKind {
    /// Balance credited from an external source
    Fund = 1,
    /// Balance debited by an outgoing transfer
    TransferOut = 2,
    /// Balance credited by an incoming transfer
    TransferIn = 3,
}

impl TransactionKind {
    /// Wire/display code
    pub fn code(&self) -> &'static str {
        match self {
            TransactionKind::Fund => "FUND",
            TransactionKind::TransferOut => "TRANSFER_OUT",
            TransactionKind::TransferIn => "TRANSFER_IN",
        }
    }

    /// True when the entry adds to the owning wallet's balance
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Fund | TransactionKind::TransferIn)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// An immutable ledger entry recording one balance-affecting event
///
/// Entries are append-only: once committed they are never mutated or
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Wallet this entry belongs to
    pub wallet_id: Uuid,

    /// Entry type
    pub kind: TransactionKind,

    /// Amount (non-negative, 2 decimal places)
    pub amount: Decimal,

    /// Counterpart wallet (set for transfers)
    pub related_wallet_id: Option<Uuid>,

    /// Human-readable note
    pub description: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new ledger entry stamped with the current time
    pub fn new(
        wallet_id: Uuid,
        kind: TransactionKind,
        amount: Decimal,
        related_wallet_id: Option<Uuid>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            wallet_id,
            kind,
            amount,
            related_wallet_id,
            description,
            created_at: Utc::now(),
        }
    }

    /// Signed contribution of this entry to the owning wallet's balance
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_from_str() {
        assert_eq!(Currency::from_str("USD"), Some(Currency::USD));
        assert_eq!(Currency::from_str("NGN"), Some(Currency::NGN));
        assert_eq!(Currency::from_str("INVALID"), None);
    }

    #[test]
    fn test_currency_default_is_usd() {
        assert_eq!(Currency::default(), Currency::USD);
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(Decimal::new(100999, 3)), Decimal::new(10100, 2)); // 100.999 -> 101.00
        assert_eq!(round2(Decimal::new(100123, 3)), Decimal::new(10012, 2)); // 100.123 -> 100.12
        assert_eq!(round2(Decimal::new(100456, 3)), Decimal::new(10046, 2)); // 100.456 -> 100.46
        assert_eq!(round2(Decimal::new(100455, 3)), Decimal::new(10046, 2)); // midpoint rounds up
    }

    #[test]
    fn test_balance_range() {
        assert!(within_balance_range(Decimal::ZERO));
        assert!(within_balance_range(max_balance()));
        assert!(!within_balance_range(Decimal::new(-1, 2)));
        assert!(!within_balance_range(max_balance() + Decimal::new(1, 2)));
    }

    #[test]
    fn test_validate_amount_rejects_nonpositive() {
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::new(-100, 2)).is_err());
        // 0.004 rounds to 0.00, which is not a valid amount
        assert!(validate_amount(Decimal::new(4, 3)).is_err());
        assert_eq!(
            validate_amount(Decimal::new(5, 3)).unwrap(),
            Decimal::new(1, 2)
        );
    }

    #[test]
    fn test_validate_initial_balance_allows_zero() {
        assert_eq!(
            validate_initial_balance(Decimal::ZERO).unwrap(),
            Decimal::ZERO
        );
        assert!(validate_initial_balance(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_signed_amount() {
        let wallet_id = Uuid::new_v4();
        let credit = Transaction::new(
            wallet_id,
            TransactionKind::Fund,
            Decimal::new(10000, 2),
            None,
            None,
        );
        let debit = Transaction::new(
            wallet_id,
            TransactionKind::TransferOut,
            Decimal::new(3000, 2),
            Some(Uuid::new_v4()),
            None,
        );

        assert_eq!(credit.signed_amount(), Decimal::new(10000, 2));
        assert_eq!(debit.signed_amount(), Decimal::new(-3000, 2));
    }

    #[test]
    fn test_wire_codes_in_json() {
        // Entry kinds and currencies keep their wire spelling in JSON
        assert_eq!(
            serde_json::to_string(&TransactionKind::TransferOut).unwrap(),
            "\"TRANSFER_OUT\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionKind::Fund).unwrap(),
            "\"FUND\""
        );
        assert_eq!(serde_json::to_string(&Currency::NGN).unwrap(), "\"NGN\"");

        let kind: TransactionKind = serde_json::from_str("\"TRANSFER_IN\"").unwrap();
        assert_eq!(kind, TransactionKind::TransferIn);
    }

    #[test]
    fn test_transaction_ids_are_v7() {
        let a = Transaction::new(
            Uuid::new_v4(),
            TransactionKind::Fund,
            Decimal::ONE,
            None,
            None,
        );
        let b = Transaction::new(
            Uuid::new_v4(),
            TransactionKind::Fund,
            Decimal::ONE,
            None,
            None,
        );

        assert_eq!(a.id.get_version_num(), 7);
        assert_ne!(a.id, b.id);
    }
}
