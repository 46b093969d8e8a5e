//! Balance integrity verification
//!
//! Recomputes a wallet's balance by replaying its full transaction history
//! and compares the result against the stored balance. Pure and read-only:
//! a detected mismatch is an operational alert for the caller to log, never
//! a request failure.

use crate::types::{round2, Transaction, Wallet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of replaying a wallet's history against its stored balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// True when the discrepancy is below the tolerance
    pub is_valid: bool,

    /// Balance implied by the transaction history
    pub calculated_balance: Decimal,

    /// Balance currently stored on the wallet row
    pub current_balance: Decimal,

    /// Absolute difference between stored and calculated
    pub discrepancy: Decimal,
}

/// Drift strictly below this threshold counts as clean (one cent)
fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Replay a wallet's history and compare against its stored balance
///
/// Credits (FUND, TRANSFER_IN) add, debits (TRANSFER_OUT) subtract, and the
/// sum is rounded to 2 decimal places before comparison.
pub fn verify(wallet: &Wallet, history: &[Transaction]) -> IntegrityReport {
    let calculated = round2(history.iter().map(Transaction::signed_amount).sum());
    let discrepancy = (wallet.balance - calculated).abs();

    IntegrityReport {
        is_valid: discrepancy < tolerance(),
        calculated_balance: calculated,
        current_balance: wallet.balance,
        discrepancy,
    }
}
