use std::sync::Arc;

use rust_decimal::Decimal;

/// Outcome of a successful transfer, for display by the shell.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub new_balance: Decimal,
    pub recipient: Arc<str>,
}
