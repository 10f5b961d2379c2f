use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

use bankdb::directory::{AccountDirectory, AccountPolicy};
use bankdb::models::write::OpenAccountCommand;
use bankdb::session::Session;
use bankdb::storage::InMemoryStore;
use bankdb::teller::Teller;

fn setup() -> (AccountDirectory, Teller) {
    let store = Arc::new(InMemoryStore::new());
    let directory = AccountDirectory::new(store.clone(), AccountPolicy::default());
    let teller = Teller::new(store);
    (directory, teller)
}

fn open_account(directory: &AccountDirectory, name: &str) -> Arc<str> {
    directory
        .create_account(&OpenAccountCommand {
            name: name.to_string(),
            credential: "hunter22".to_string(),
            date_of_birth: "1990-04-01".to_string(),
            phone: "5550001234".to_string(),
            initial_deposit: Decimal::from(500),
        })
        .unwrap()
}

fn login(directory: &AccountDirectory, number: &str) -> Session {
    let mut session = Session::new();
    session.login(directory, number, "hunter22").unwrap();
    session
}

fn bench_deposit(c: &mut Criterion) {
    let (directory, teller) = setup();
    let number = open_account(&directory, "Bench Holder");
    let mut session = login(&directory, &number);

    c.bench_function("deposit", |b| {
        b.iter(|| {
            teller
                .deposit(&mut session, black_box(Decimal::from(25)))
                .unwrap()
        })
    });
}

fn bench_transfer(c: &mut Criterion) {
    let (directory, teller) = setup();
    let sender = open_account(&directory, "Bench Sender");
    let recipient = open_account(&directory, "Bench Recipient");
    let mut session = login(&directory, &sender);

    // Deposit the same amount back each round so the sender never runs dry.
    c.bench_function("transfer", |b| {
        b.iter(|| {
            teller
                .transfer(&mut session, &recipient, black_box(Decimal::from(100)))
                .unwrap();
            teller
                .deposit(&mut session, black_box(Decimal::from(100)))
                .unwrap()
        })
    });
}

fn bench_balance_lookup(c: &mut Criterion) {
    let (directory, teller) = setup();
    let number = open_account(&directory, "Bench Holder");
    let mut session = login(&directory, &number);

    c.bench_function("balance_lookup", |b| {
        b.iter(|| teller.balance_of(black_box(&mut session)).unwrap())
    });
}

criterion_group!(benches, bench_deposit, bench_transfer, bench_balance_lookup);
criterion_main!(benches);
