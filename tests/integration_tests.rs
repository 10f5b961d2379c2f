use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bankdb::directory::{AccountDirectory, AccountPolicy, DirectoryError};
use bankdb::models::write::OpenAccountCommand;
use bankdb::models::TransactionKind;
use bankdb::session::Session;
use bankdb::sqlite_storage::SqliteStore;
use bankdb::storage::LedgerStore;
use bankdb::teller::{Teller, TellerError};

fn setup() -> (Arc<dyn LedgerStore>, AccountDirectory, Teller) {
    let store: Arc<dyn LedgerStore> = Arc::new(SqliteStore::new(":memory:").unwrap());
    let directory = AccountDirectory::new(store.clone(), AccountPolicy::default());
    let teller = Teller::new(store.clone());
    (store, directory, teller)
}

fn open_account(directory: &AccountDirectory, name: &str, deposit: Decimal) -> Arc<str> {
    directory
        .create_account(&OpenAccountCommand {
            name: name.to_string(),
            credential: "hunter22".to_string(),
            date_of_birth: "1990-04-01".to_string(),
            phone: "5550001234".to_string(),
            initial_deposit: deposit,
        })
        .unwrap()
}

fn login(directory: &AccountDirectory, number: &str) -> Session {
    let mut session = Session::new();
    session.login(directory, number, "hunter22").unwrap();
    session
}

/// Sum of an account's ledger with Deposit/TransferIn positive and
/// Withdraw/TransferOut negative.
fn signed_sum(store: &Arc<dyn LedgerStore>, number: &str) -> Decimal {
    store
        .list_transactions(number)
        .unwrap()
        .iter()
        .map(|t| t.kind.signum() * t.amount)
        .sum()
}

#[test]
fn test_end_to_end_scenario() {
    let (store, directory, teller) = setup();

    // Open with 500.00: balance 500.00 and exactly one Deposit record.
    let number = open_account(&directory, "Ada Lovelace", dec!(500.00));
    let mut session = login(&directory, &number);
    assert_eq!(store.fetch_balance(&number).unwrap(), dec!(500.00));
    let log = store.list_transactions(&number).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, TransactionKind::Deposit);
    assert_eq!(log[0].amount, dec!(500.00));

    // Deposit 250.00.
    let balance = teller.deposit(&mut session, dec!(250.00)).unwrap();
    assert_eq!(balance, dec!(750.00));

    // Withdraw 1000.00 fails and changes nothing.
    let err = teller.withdraw(&mut session, dec!(1000.00)).unwrap_err();
    assert!(matches!(err, TellerError::InsufficientFunds { .. }));
    assert_eq!(store.fetch_balance(&number).unwrap(), dec!(750.00));

    // Transfer 300.00 to a fresh account.
    let recipient = open_account(&directory, "Grace Hopper", dec!(500.00));
    let mut recipient_session = login(&directory, &recipient);
    teller
        .withdraw(&mut recipient_session, dec!(500.00))
        .unwrap();
    assert_eq!(store.fetch_balance(&recipient).unwrap(), dec!(0.00));

    let sender_log_before = store.list_transactions(&number).unwrap().len();
    let recipient_log_before = store.list_transactions(&recipient).unwrap().len();
    let receipt = teller
        .transfer(&mut session, &recipient, dec!(300.00))
        .unwrap();
    assert_eq!(receipt.new_balance, dec!(450.00));
    assert_eq!(store.fetch_balance(&recipient).unwrap(), dec!(300.00));
    assert_eq!(
        store.list_transactions(&number).unwrap().len(),
        sender_log_before + 1
    );
    assert_eq!(
        store.list_transactions(&recipient).unwrap().len(),
        recipient_log_before + 1
    );

    // Transfer to a nonexistent account fails and changes nothing.
    let err = teller
        .transfer(&mut session, "0000000000", dec!(10.00))
        .unwrap_err();
    assert!(matches!(err, TellerError::AccountNotFound(_)));
    assert_eq!(store.fetch_balance(&number).unwrap(), dec!(450.00));
    assert_eq!(
        store.list_transactions(&number).unwrap().len(),
        sender_log_before + 1
    );
}

#[test]
fn test_balance_equals_signed_transaction_sum() {
    let (store, directory, teller) = setup();
    let a = open_account(&directory, "Ada Lovelace", dec!(600.00));
    let b = open_account(&directory, "Grace Hopper", dec!(500.00));
    let mut session = login(&directory, &a);

    teller.deposit(&mut session, dec!(120.25)).unwrap();
    teller.withdraw(&mut session, dec!(40.75)).unwrap();
    teller.transfer(&mut session, &b, dec!(99.99)).unwrap();
    teller.deposit(&mut session, dec!(1.00)).unwrap();

    assert_eq!(store.fetch_balance(&a).unwrap(), signed_sum(&store, &a));
    assert_eq!(store.fetch_balance(&b).unwrap(), signed_sum(&store, &b));
}

#[test]
fn test_transfer_writes_linked_pair() {
    let (store, directory, teller) = setup();
    let a = open_account(&directory, "Ada Lovelace", dec!(600.00));
    let b = open_account(&directory, "Grace Hopper", dec!(500.00));
    let mut session = login(&directory, &a);

    teller.transfer(&mut session, &b, dec!(150.00)).unwrap();

    let out_leg = store
        .list_transactions(&a)
        .unwrap()
        .into_iter()
        .find(|t| t.kind == TransactionKind::TransferOut)
        .unwrap();
    let in_leg = store
        .list_transactions(&b)
        .unwrap()
        .into_iter()
        .find(|t| t.kind == TransactionKind::TransferIn)
        .unwrap();
    assert_eq!(out_leg.amount, dec!(150.00));
    assert_eq!(in_leg.amount, dec!(150.00));
    assert_eq!(out_leg.timestamp, in_leg.timestamp);
}

#[test]
fn test_failed_transfer_leaves_both_ledgers_untouched() {
    let (store, directory, teller) = setup();
    let a = open_account(&directory, "Ada Lovelace", dec!(600.00));
    let b = open_account(&directory, "Grace Hopper", dec!(500.00));
    let mut session = login(&directory, &a);

    let err = teller.transfer(&mut session, &b, dec!(600.01)).unwrap_err();
    assert!(matches!(err, TellerError::InsufficientFunds { .. }));

    assert_eq!(store.fetch_balance(&a).unwrap(), dec!(600.00));
    assert_eq!(store.fetch_balance(&b).unwrap(), dec!(500.00));
    assert_eq!(store.list_transactions(&a).unwrap().len(), 1);
    assert_eq!(store.list_transactions(&b).unwrap().len(), 1);
}

#[test]
fn test_self_transfer_always_rejected() {
    let (_, directory, teller) = setup();
    let a = open_account(&directory, "Ada Lovelace", dec!(600.00));
    let mut session = login(&directory, &a);

    let err = teller.transfer(&mut session, &a, dec!(1.00)).unwrap_err();
    assert!(matches!(err, TellerError::Validation(_)));
}

#[test]
fn test_account_numbers_unique_across_creations() {
    let (_, directory, _) = setup();
    let mut seen = HashSet::new();
    for i in 0..50 {
        let number = open_account(&directory, &format!("Holder {i}"), dec!(500.00));
        assert!(seen.insert(number.to_string()), "duplicate account number");
    }
}

#[test]
fn test_login_failure_is_opaque() {
    let (_, directory, _) = setup();
    let number = open_account(&directory, "Ada Lovelace", dec!(500.00));

    let mut session = Session::new();
    let wrong_credential = session
        .login(&directory, &number, "letmein")
        .unwrap_err();
    let unknown_account = session
        .login(&directory, "0000000000", "hunter22")
        .unwrap_err();
    assert!(matches!(wrong_credential, DirectoryError::AuthFailure));
    assert!(matches!(unknown_account, DirectoryError::AuthFailure));
    assert_eq!(wrong_credential.to_string(), unknown_account.to_string());
    assert!(!session.is_authenticated());
}

#[test]
fn test_operations_require_authentication() {
    let (_, _, teller) = setup();
    let mut session = Session::new();

    assert!(matches!(
        teller.deposit(&mut session, dec!(10.00)),
        Err(TellerError::NotAuthenticated)
    ));
    assert!(matches!(
        teller.balance_of(&mut session),
        Err(TellerError::NotAuthenticated)
    ));
}

#[test]
fn test_balance_of_refreshes_session_cache() {
    let (store, directory, teller) = setup();
    let number = open_account(&directory, "Ada Lovelace", dec!(500.00));
    let mut session = login(&directory, &number);

    // Mutate behind the session's back, as a second teller instance would.
    store.set_balance(&number, dec!(812.34)).unwrap();
    assert_eq!(session.cached_balance(), Some(dec!(500.00)));

    let balance = teller.balance_of(&mut session).unwrap();
    assert_eq!(balance, dec!(812.34));
    assert_eq!(session.cached_balance(), Some(dec!(812.34)));
}
