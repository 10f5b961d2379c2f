use std::sync::Arc;

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};

use super::TransactionKind;

/// Account-opening input as collected by the shell, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAccountCommand {
    pub name: String,
    pub credential: String,
    pub date_of_birth: String,
    pub phone: String,
    pub initial_deposit: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateAccountCommand {
    pub number: Arc<str>,
    pub name: Arc<str>,
    pub credential: Arc<str>,
    pub date_of_birth: Date,
    pub phone: Arc<str>,
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendTransactionCommand {
    pub timestamp: OffsetDateTime,
    pub account_number: Arc<str>,
    pub kind: TransactionKind,
    pub amount: Decimal,
}
