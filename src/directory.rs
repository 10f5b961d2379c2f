use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Date, Month, OffsetDateTime};

use crate::{
    models::{
        write::{AppendTransactionCommand, CreateAccountCommand, OpenAccountCommand},
        Account, TransactionKind,
    },
    storage::{LedgerStore, StorageError},
};

// Candidates are drawn uniformly from the 10-digit range, a space of 9x10^9
// numbers: even at 100k live accounts a single draw collides with
// probability ~1e-5, so the retry loop terminates almost immediately.
const ACCOUNT_NUMBER_MIN: u64 = 1_000_000_000;
const ACCOUNT_NUMBER_MAX: u64 = 9_999_999_999;
const MAX_GENERATION_ATTEMPTS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("credential must be at least {minimum} characters")]
    CredentialTooShort { minimum: usize },
    #[error("date of birth must be a valid YYYY-MM-DD date")]
    InvalidDateOfBirth,
    #[error("phone number must be {expected} digits")]
    InvalidPhone { expected: usize },
    #[error("initial deposit must be at least {minimum}")]
    BelowMinimumDeposit { minimum: Decimal },
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("amount can have at most 2 decimal places")]
    TooPrecise,
    #[error("cannot transfer to the same account")]
    SelfTransfer,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("invalid account number or credential")]
    AuthFailure,
    #[error("account number space exhausted")]
    NumberSpaceExhausted,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Input constraints applied at account opening.
#[derive(Debug, Clone)]
pub struct AccountPolicy {
    pub minimum_initial_deposit: Decimal,
    pub credential_min_length: usize,
    pub phone_length: usize,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            minimum_initial_deposit: Decimal::from(500),
            credential_min_length: 4,
            phone_length: 10,
        }
    }
}

/// Normalizes a monetary amount to 2 fractional digits, rejecting
/// non-positive or over-precise values.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    if amount.scale() > 2 {
        return Err(ValidationError::TooPrecise);
    }
    let mut amount = amount;
    amount.rescale(2);
    Ok(amount)
}

pub struct AccountDirectory {
    store: Arc<dyn LedgerStore>,
    policy: AccountPolicy,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn LedgerStore>, policy: AccountPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AccountPolicy {
        &self.policy
    }

    /// Opens a new account: validates the application, assigns a fresh
    /// account number, and persists the account row together with its
    /// opening deposit record as one atomic unit.
    pub fn create_account(
        &self,
        application: &OpenAccountCommand,
    ) -> Result<Arc<str>, DirectoryError> {
        let command = self.prepare(application)?;

        let tx_id = self.store.begin_transaction()?;
        let result = self.store.insert_account(&command).and_then(|_| {
            self.store.append_transaction(&AppendTransactionCommand {
                timestamp: OffsetDateTime::now_utc(),
                account_number: command.number.clone(),
                kind: TransactionKind::Deposit,
                amount: command.opening_balance,
            })
        });
        match result {
            Ok(_) => {
                self.store.commit_transaction(tx_id)?;
                tracing::info!(number = %command.number, "account created");
                Ok(command.number)
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback_transaction(tx_id) {
                    tracing::warn!(error = %rb, "rollback failed after aborted account creation");
                }
                Err(e.into())
            }
        }
    }

    /// Verifies an account number / credential pair. The failure is identical
    /// for an unknown account and a wrong credential, so callers cannot probe
    /// for account existence.
    pub fn authenticate(&self, number: &str, credential: &str) -> Result<Account, DirectoryError> {
        let account = self
            .store
            .find_account(number)?
            .ok_or(DirectoryError::AuthFailure)?;
        let matches: bool = account
            .credential
            .as_bytes()
            .ct_eq(credential.as_bytes())
            .into();
        if matches {
            Ok(account)
        } else {
            Err(DirectoryError::AuthFailure)
        }
    }

    fn prepare(
        &self,
        application: &OpenAccountCommand,
    ) -> Result<CreateAccountCommand, DirectoryError> {
        let name = application.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if application.credential.len() < self.policy.credential_min_length {
            return Err(ValidationError::CredentialTooShort {
                minimum: self.policy.credential_min_length,
            }
            .into());
        }
        let date_of_birth = parse_date(&application.date_of_birth)
            .ok_or(ValidationError::InvalidDateOfBirth)?;
        let phone = application.phone.trim();
        if phone.len() != self.policy.phone_length
            || !phone.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidPhone {
                expected: self.policy.phone_length,
            }
            .into());
        }
        let opening_balance = validate_amount(application.initial_deposit)?;
        if opening_balance < self.policy.minimum_initial_deposit {
            return Err(ValidationError::BelowMinimumDeposit {
                minimum: self.policy.minimum_initial_deposit,
            }
            .into());
        }

        Ok(CreateAccountCommand {
            number: self.generate_account_number()?,
            name: Arc::from(name),
            credential: Arc::from(application.credential.as_str()),
            date_of_birth,
            phone: Arc::from(phone),
            opening_balance,
        })
    }

    /// Draws random candidates until the store reports no collision.
    fn generate_account_number(&self) -> Result<Arc<str>, DirectoryError> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let candidate = rng
                .gen_range(ACCOUNT_NUMBER_MIN..=ACCOUNT_NUMBER_MAX)
                .to_string();
            if !self.store.account_exists(&candidate)? {
                return Ok(Arc::from(candidate.as_str()));
            }
        }
        Err(DirectoryError::NumberSpaceExhausted)
    }
}

fn parse_date(s: &str) -> Option<Date> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let year = parts[0].parse::<i32>().ok()?;
    let month = Month::try_from(parts[1].parse::<u8>().ok()?).ok()?;
    let day = parts[2].parse::<u8>().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}
