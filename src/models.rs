use std::sync::Arc;

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};

pub mod read;
pub mod write;

/// Width of a system-generated account number, in digits.
pub const ACCOUNT_NUMBER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    /// Sign applied to the amount when summing a ledger.
    pub fn signum(&self) -> Decimal {
        match self {
            TransactionKind::Deposit | TransactionKind::TransferIn => Decimal::ONE,
            TransactionKind::Withdraw | TransactionKind::TransferOut => -Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub number: Arc<str>,
    pub name: Arc<str>,
    pub credential: Arc<str>,
    pub date_of_birth: Date,
    pub phone: Arc<str>,
    pub balance: Decimal,
}

/// One immutable ledger line. A transfer produces two of these, sharing a
/// timestamp and amount.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: u64,
    pub timestamp: OffsetDateTime,
    pub account_number: Arc<str>,
    pub kind: TransactionKind,
    pub amount: Decimal,
}
