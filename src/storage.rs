use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{
    write::{AppendTransactionCommand, CreateAccountCommand},
    Account, TransactionRecord,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("duplicate account number: {0}")]
    DuplicateAccountNumber(String),
    #[error("no active transaction")]
    NoActiveTransaction,
    #[error("{0}")]
    Other(String),
}

pub type TransactionId = u64;

/// Persistent home of accounts and their transaction log. Multi-step
/// mutations are bracketed by `begin_transaction`/`commit_transaction`;
/// `rollback_transaction` discards every effect since the matching begin.
pub trait LedgerStore: Send + Sync {
    /// Fails with `DuplicateAccountNumber` if the number is already taken.
    fn insert_account(&self, command: &CreateAccountCommand) -> Result<(), StorageError>;
    fn account_exists(&self, number: &str) -> Result<bool, StorageError>;
    fn find_account(&self, number: &str) -> Result<Option<Account>, StorageError>;
    fn fetch_balance(&self, number: &str) -> Result<Decimal, StorageError>;
    fn set_balance(&self, number: &str, balance: Decimal) -> Result<(), StorageError>;
    /// Appends one ledger line and returns its sequence id.
    fn append_transaction(&self, command: &AppendTransactionCommand) -> Result<u64, StorageError>;
    /// All records for an account, in append order.
    fn list_transactions(&self, number: &str) -> Result<Vec<TransactionRecord>, StorageError>;

    fn begin_transaction(&self) -> Result<TransactionId, StorageError>;
    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
}

struct Snapshot {
    accounts: BTreeMap<Arc<str>, Account>,
    transactions: Vec<TransactionRecord>,
    sequence_value: u64,
}

pub struct InMemoryStore {
    accounts: RwLock<BTreeMap<Arc<str>, Account>>,
    transactions: RwLock<Vec<TransactionRecord>>,
    sequence_counter: AtomicU64,
    tx_counter: AtomicU64,
    snapshots: RwLock<HashMap<TransactionId, Snapshot>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            transactions: RwLock::new(Vec::new()),
            sequence_counter: AtomicU64::new(1),
            tx_counter: AtomicU64::new(1),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }
}

impl LedgerStore for InMemoryStore {
    fn insert_account(&self, command: &CreateAccountCommand) -> Result<(), StorageError> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(command.number.as_ref()) {
            return Err(StorageError::DuplicateAccountNumber(
                command.number.to_string(),
            ));
        }
        accounts.insert(
            command.number.clone(),
            Account {
                number: command.number.clone(),
                name: command.name.clone(),
                credential: command.credential.clone(),
                date_of_birth: command.date_of_birth,
                phone: command.phone.clone(),
                balance: command.opening_balance,
            },
        );
        Ok(())
    }

    fn account_exists(&self, number: &str) -> Result<bool, StorageError> {
        Ok(self.accounts.read().unwrap().contains_key(number))
    }

    fn find_account(&self, number: &str) -> Result<Option<Account>, StorageError> {
        Ok(self.accounts.read().unwrap().get(number).cloned())
    }

    fn fetch_balance(&self, number: &str) -> Result<Decimal, StorageError> {
        self.accounts
            .read()
            .unwrap()
            .get(number)
            .map(|a| a.balance)
            .ok_or_else(|| StorageError::AccountNotFound(number.to_string()))
    }

    fn set_balance(&self, number: &str, balance: Decimal) -> Result<(), StorageError> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .get_mut(number)
            .ok_or_else(|| StorageError::AccountNotFound(number.to_string()))?;
        account.balance = balance;
        Ok(())
    }

    fn append_transaction(&self, command: &AppendTransactionCommand) -> Result<u64, StorageError> {
        if !self
            .accounts
            .read()
            .unwrap()
            .contains_key(command.account_number.as_ref())
        {
            return Err(StorageError::AccountNotFound(
                command.account_number.to_string(),
            ));
        }
        let id = self.next_sequence();
        self.transactions.write().unwrap().push(TransactionRecord {
            id,
            timestamp: command.timestamp,
            account_number: command.account_number.clone(),
            kind: command.kind,
            amount: command.amount,
        });
        Ok(id)
    }

    fn list_transactions(&self, number: &str) -> Result<Vec<TransactionRecord>, StorageError> {
        Ok(self
            .transactions
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.account_number.as_ref() == number)
            .cloned()
            .collect())
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let snapshot = Snapshot {
            accounts: self.accounts.read().unwrap().clone(),
            transactions: self.transactions.read().unwrap().clone(),
            sequence_value: self.sequence_counter.load(Ordering::SeqCst),
        };
        self.snapshots.write().unwrap().insert(tx_id, snapshot);
        tracing::debug!(tx_id, "Transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.snapshots
            .write()
            .unwrap()
            .remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        tracing::debug!(tx_id, "Transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let snapshot = self
            .snapshots
            .write()
            .unwrap()
            .remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        *self.accounts.write().unwrap() = snapshot.accounts;
        *self.transactions.write().unwrap() = snapshot.transactions;
        self.sequence_counter
            .store(snapshot.sequence_value, Ordering::SeqCst);
        tracing::debug!(tx_id, "Transaction rolled back");
        Ok(())
    }
}
