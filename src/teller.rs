use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use time::OffsetDateTime;

use crate::{
    directory::{validate_amount, ValidationError},
    models::{read::TransferReceipt, write::AppendTransactionCommand, TransactionKind},
    session::Session,
    storage::{LedgerStore, StorageError},
};

#[derive(Debug, Error)]
pub enum TellerError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("operation requires an authenticated session")]
    NotAuthenticated,
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("insufficient funds: available {available}")]
    InsufficientFunds { available: Decimal },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Performs every balance-affecting operation. Each multi-step mutation runs
/// inside one store transaction: the balance change and its transaction
/// record commit together or not at all.
pub struct Teller {
    store: Arc<dyn LedgerStore>,
}

impl Teller {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Credits the session's account and appends the matching Deposit record.
    pub fn deposit(&self, session: &mut Session, amount: Decimal) -> Result<Decimal, TellerError> {
        let number = Self::bound_account(session)?;
        let amount = validate_amount(amount)?;

        let balance = self.atomic_unit(|| {
            let balance = self.store.fetch_balance(&number)? + amount;
            self.store.set_balance(&number, balance)?;
            self.store.append_transaction(&AppendTransactionCommand {
                timestamp: OffsetDateTime::now_utc(),
                account_number: number.clone(),
                kind: TransactionKind::Deposit,
                amount,
            })?;
            Ok(balance)
        })?;

        session.update_balance(balance);
        Ok(balance)
    }

    /// Debits the session's account, refusing to take the balance negative.
    pub fn withdraw(&self, session: &mut Session, amount: Decimal) -> Result<Decimal, TellerError> {
        let number = Self::bound_account(session)?;
        let amount = validate_amount(amount)?;

        let balance = self.atomic_unit(|| {
            let available = self.store.fetch_balance(&number)?;
            if available < amount {
                return Err(TellerError::InsufficientFunds { available });
            }
            let balance = available - amount;
            self.store.set_balance(&number, balance)?;
            self.store.append_transaction(&AppendTransactionCommand {
                timestamp: OffsetDateTime::now_utc(),
                account_number: number.clone(),
                kind: TransactionKind::Withdraw,
                amount,
            })?;
            Ok(balance)
        })?;

        session.update_balance(balance);
        Ok(balance)
    }

    /// Moves funds to another account. The debit, the credit, and the two
    /// linked transfer records commit as one unit.
    pub fn transfer(
        &self,
        session: &mut Session,
        to_account: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, TellerError> {
        let number = Self::bound_account(session)?;
        let amount = validate_amount(amount)?;
        if number.as_ref() == to_account {
            return Err(ValidationError::SelfTransfer.into());
        }

        let receipt = self.atomic_unit(|| {
            let recipient = self
                .store
                .find_account(to_account)?
                .ok_or_else(|| TellerError::AccountNotFound(to_account.to_string()))?;
            let available = self.store.fetch_balance(&number)?;
            if available < amount {
                return Err(TellerError::InsufficientFunds { available });
            }

            let new_balance = available - amount;
            self.store.set_balance(&number, new_balance)?;
            self.store
                .set_balance(&recipient.number, recipient.balance + amount)?;

            // Both legs share one timestamp so the pair stays linked.
            let timestamp = OffsetDateTime::now_utc();
            self.store.append_transaction(&AppendTransactionCommand {
                timestamp,
                account_number: number.clone(),
                kind: TransactionKind::TransferOut,
                amount,
            })?;
            self.store.append_transaction(&AppendTransactionCommand {
                timestamp,
                account_number: recipient.number.clone(),
                kind: TransactionKind::TransferIn,
                amount,
            })?;

            Ok(TransferReceipt {
                new_balance,
                recipient: recipient.name,
            })
        })?;

        session.update_balance(receipt.new_balance);
        Ok(receipt)
    }

    /// Authoritative balance from the store; refreshes the session snapshot.
    pub fn balance_of(&self, session: &mut Session) -> Result<Decimal, TellerError> {
        let number = Self::bound_account(session)?;
        let balance = self.store.fetch_balance(&number)?;
        session.update_balance(balance);
        Ok(balance)
    }

    fn bound_account(session: &Session) -> Result<Arc<str>, TellerError> {
        session.account_number().ok_or(TellerError::NotAuthenticated)
    }

    /// Runs `body` between begin and commit; any error rolls the unit back
    /// before it is surfaced.
    fn atomic_unit<T>(
        &self,
        body: impl FnOnce() -> Result<T, TellerError>,
    ) -> Result<T, TellerError> {
        let tx_id = self.store.begin_transaction()?;
        match body() {
            Ok(value) => {
                self.store.commit_transaction(tx_id)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback_transaction(tx_id) {
                    tracing::warn!(error = %rb, "rollback failed after aborted operation");
                }
                Err(e)
            }
        }
    }
}
