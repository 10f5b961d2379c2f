use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use time::{Date, Month, OffsetDateTime};

use crate::{
    models::{
        write::{AppendTransactionCommand, CreateAccountCommand},
        Account, TransactionKind, TransactionRecord,
    },
    storage::{LedgerStore, StorageError, TransactionId},
};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    tx_counter: AtomicU64,
    active_tx: Mutex<Option<TransactionId>>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StorageError::Other(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
            tx_counter: AtomicU64::new(1),
            active_tx: Mutex::new(None),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                credential TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                phone TEXT NOT NULL,
                balance TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                account_number TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount TEXT NOT NULL,
                FOREIGN KEY (account_number) REFERENCES accounts(number)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_account
                ON transactions(account_number);
            ",
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }
}

fn date_to_str(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

fn str_to_date(s: &str) -> Result<Date, StorageError> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return Err(StorageError::Other(format!("malformed date: {s}")));
    }
    let year = parts[0]
        .parse::<i32>()
        .map_err(|e| StorageError::Other(e.to_string()))?;
    let month = parts[1]
        .parse::<u8>()
        .map_err(|e| StorageError::Other(e.to_string()))?;
    let day = parts[2]
        .parse::<u8>()
        .map_err(|e| StorageError::Other(e.to_string()))?;
    let month = Month::try_from(month).map_err(|e| StorageError::Other(e.to_string()))?;
    Date::from_calendar_date(year, month, day).map_err(|e| StorageError::Other(e.to_string()))
}

fn kind_to_str(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Deposit => "DEPOSIT",
        TransactionKind::Withdraw => "WITHDRAW",
        TransactionKind::TransferOut => "TRANSFER_OUT",
        TransactionKind::TransferIn => "TRANSFER_IN",
    }
}

fn str_to_kind(s: &str) -> Result<TransactionKind, StorageError> {
    match s {
        "DEPOSIT" => Ok(TransactionKind::Deposit),
        "WITHDRAW" => Ok(TransactionKind::Withdraw),
        "TRANSFER_OUT" => Ok(TransactionKind::TransferOut),
        "TRANSFER_IN" => Ok(TransactionKind::TransferIn),
        _ => Err(StorageError::Other(format!("unknown transaction kind: {s}"))),
    }
}

fn str_to_decimal(s: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(s).map_err(|e| StorageError::Other(format!("invalid decimal: {e}")))
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl LedgerStore for SqliteStore {
    fn insert_account(&self, command: &CreateAccountCommand) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        match conn.execute(
            "INSERT INTO accounts (number, name, credential, date_of_birth, phone, balance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                command.number.as_ref(),
                command.name.as_ref(),
                command.credential.as_ref(),
                date_to_str(command.date_of_birth),
                command.phone.as_ref(),
                command.opening_balance.to_string()
            ],
        ) {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::DuplicateAccountNumber(
                command.number.to_string(),
            )),
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    fn account_exists(&self, number: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM accounts WHERE number = ?1",
            params![number],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::Other(e.to_string()))
    }

    fn find_account(&self, number: &str) -> Result<Option<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT number, name, credential, date_of_birth, phone, balance
             FROM accounts WHERE number = ?1",
            params![number],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        );
        match result {
            Ok((number, name, credential, date_of_birth, phone, balance)) => Ok(Some(Account {
                number: Arc::from(number.as_str()),
                name: Arc::from(name.as_str()),
                credential: Arc::from(credential.as_str()),
                date_of_birth: str_to_date(&date_of_birth)?,
                phone: Arc::from(phone.as_str()),
                balance: str_to_decimal(&balance)?,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    fn fetch_balance(&self, number: &str) -> Result<Decimal, StorageError> {
        let conn = self.conn.lock().unwrap();
        let result: Result<String, _> = conn.query_row(
            "SELECT balance FROM accounts WHERE number = ?1",
            params![number],
            |row| row.get(0),
        );
        match result {
            Ok(balance) => str_to_decimal(&balance),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StorageError::AccountNotFound(number.to_string()))
            }
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    fn set_balance(&self, number: &str, balance: Decimal) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE accounts SET balance = ?1 WHERE number = ?2",
                params![balance.to_string(), number],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        if updated == 0 {
            return Err(StorageError::AccountNotFound(number.to_string()));
        }
        Ok(())
    }

    fn append_transaction(&self, command: &AppendTransactionCommand) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        match conn.execute(
            "INSERT INTO transactions (created_at, account_number, kind, amount)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                command.timestamp.unix_timestamp(),
                command.account_number.as_ref(),
                kind_to_str(command.kind),
                command.amount.to_string()
            ],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid() as u64),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::AccountNotFound(
                command.account_number.to_string(),
            )),
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    fn list_transactions(&self, number: &str) -> Result<Vec<TransactionRecord>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, account_number, kind, amount
                 FROM transactions WHERE account_number = ?1 ORDER BY id",
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let rows: Vec<(u64, i64, String, String, String)> = stmt
            .query_map(params![number], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .map_err(|e| StorageError::Other(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let mut result = Vec::with_capacity(rows.len());
        for (id, created_at, account_number, kind, amount) in rows {
            result.push(TransactionRecord {
                id,
                timestamp: OffsetDateTime::from_unix_timestamp(created_at)
                    .map_err(|e| StorageError::Other(e.to_string()))?,
                account_number: Arc::from(account_number.as_str()),
                kind: str_to_kind(&kind)?,
                amount: str_to_decimal(&amount)?,
            });
        }
        Ok(result)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("SAVEPOINT bankdb_tx")
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        *self.active_tx.lock().unwrap() = Some(tx_id);
        tracing::debug!(tx_id, "SQLite transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = self.active_tx.lock().unwrap();
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("RELEASE SAVEPOINT bankdb_tx")
            .map_err(|e| StorageError::Other(e.to_string()))?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = self.active_tx.lock().unwrap();
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("ROLLBACK TO SAVEPOINT bankdb_tx; RELEASE SAVEPOINT bankdb_tx;")
            .map_err(|e| StorageError::Other(e.to_string()))?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction rolled back");
        Ok(())
    }
}
