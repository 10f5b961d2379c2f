use std::sync::Arc;

use rust_decimal::Decimal;

use crate::directory::{AccountDirectory, DirectoryError};

#[derive(Debug, Clone)]
enum SessionState {
    Anonymous,
    Authenticated {
        number: Arc<str>,
        name: Arc<str>,
        balance: Decimal,
    },
}

/// Holds the currently authenticated account, if any. The balance kept here
/// is a display snapshot; the store value is always authoritative.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Anonymous,
        }
    }

    /// Anonymous to Authenticated on success; state is unchanged on failure.
    pub fn login(
        &mut self,
        directory: &AccountDirectory,
        number: &str,
        credential: &str,
    ) -> Result<(), DirectoryError> {
        let account = directory.authenticate(number, credential)?;
        self.state = SessionState::Authenticated {
            number: account.number,
            name: account.name,
            balance: account.balance,
        };
        Ok(())
    }

    /// Unconditional; a logout from Anonymous is a no-op.
    pub fn logout(&mut self) {
        self.state = SessionState::Anonymous;
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn account_number(&self) -> Option<Arc<str>> {
        match &self.state {
            SessionState::Authenticated { number, .. } => Some(number.clone()),
            SessionState::Anonymous => None,
        }
    }

    pub fn holder_name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { name, .. } => Some(name.as_ref()),
            SessionState::Anonymous => None,
        }
    }

    pub fn cached_balance(&self) -> Option<Decimal> {
        match &self.state {
            SessionState::Authenticated { balance, .. } => Some(*balance),
            SessionState::Anonymous => None,
        }
    }

    pub(crate) fn update_balance(&mut self, balance: Decimal) {
        if let SessionState::Authenticated {
            balance: cached, ..
        } = &mut self.state
        {
            *cached = balance;
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::directory::AccountPolicy;
    use crate::models::write::OpenAccountCommand;
    use crate::storage::InMemoryStore;

    fn directory_with_account() -> (AccountDirectory, Arc<str>) {
        let directory =
            AccountDirectory::new(Arc::new(InMemoryStore::new()), AccountPolicy::default());
        let number = directory
            .create_account(&OpenAccountCommand {
                name: "Ada Lovelace".to_string(),
                credential: "hunter22".to_string(),
                date_of_birth: "1990-04-01".to_string(),
                phone: "5550001234".to_string(),
                initial_deposit: dec!(500.00),
            })
            .unwrap();
        (directory, number)
    }

    #[test]
    fn test_login_binds_account_and_caches_balance() {
        let (directory, number) = directory_with_account();
        let mut session = Session::new();

        session.login(&directory, &number, "hunter22").unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.account_number().as_deref(), Some(number.as_ref()));
        assert_eq!(session.holder_name(), Some("Ada Lovelace"));
        assert_eq!(session.cached_balance(), Some(dec!(500.00)));
    }

    #[test]
    fn test_failed_login_leaves_session_anonymous() {
        let (directory, number) = directory_with_account();
        let mut session = Session::new();

        let err = session.login(&directory, &number, "wrong").unwrap_err();
        assert!(matches!(err, DirectoryError::AuthFailure));
        assert!(!session.is_authenticated());
        assert_eq!(session.account_number(), None);
    }

    #[test]
    fn test_logout_returns_to_anonymous() {
        let (directory, number) = directory_with_account();
        let mut session = Session::new();
        session.login(&directory, &number, "hunter22").unwrap();

        session.logout();
        assert!(!session.is_authenticated());
        assert_eq!(session.cached_balance(), None);
    }

    #[test]
    fn test_update_balance_ignored_when_anonymous() {
        let mut session = Session::new();
        session.update_balance(dec!(100.00));
        assert_eq!(session.cached_balance(), None);
    }
}
