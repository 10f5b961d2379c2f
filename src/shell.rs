use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Password, Select};
use prettytable::{row, Table};
use rust_decimal::Decimal;

use crate::{
    directory::AccountDirectory,
    models::write::OpenAccountCommand,
    session::Session,
    teller::Teller,
};

/// Menu-driven front end. All ledger decisions live below this layer; the
/// shell only collects input, dispatches, and renders results or failures.
pub struct Shell {
    directory: AccountDirectory,
    teller: Teller,
    session: Session,
}

impl Shell {
    pub fn new(directory: AccountDirectory, teller: Teller) -> Self {
        Self {
            directory,
            teller,
            session: Session::new(),
        }
    }

    /// Runs the menu loop until the user picks Exit.
    pub fn run(&mut self) -> anyhow::Result<()> {
        println!("{}", "Welcome to bankdb".bold());
        loop {
            let keep_going = if self.session.is_authenticated() {
                self.authenticated_menu()?
            } else {
                self.anonymous_menu()?
            };
            if !keep_going {
                break;
            }
        }
        println!("Thank you for banking with us.");
        Ok(())
    }

    fn anonymous_menu(&mut self) -> anyhow::Result<bool> {
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Main menu")
            .items(&["Create account", "Login", "Exit"])
            .default(0)
            .interact()?;
        match choice {
            0 => self.create_account()?,
            1 => self.login()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn authenticated_menu(&mut self) -> anyhow::Result<bool> {
        let header = format!(
            "Logged in as {}",
            self.session.holder_name().unwrap_or_default()
        );
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(header)
            .items(&[
                "Deposit",
                "Transfer",
                "Balance enquiry",
                "Withdraw",
                "Logout",
                "Exit",
            ])
            .default(0)
            .interact()?;
        match choice {
            0 => self.deposit()?,
            1 => self.transfer()?,
            2 => self.balance_enquiry()?,
            3 => self.withdraw()?,
            4 => {
                self.session.logout();
                println!("Logged out.");
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn create_account(&mut self) -> anyhow::Result<()> {
        let theme = ColorfulTheme::default();
        let name: String = Input::with_theme(&theme)
            .with_prompt("Full name")
            .interact_text()?;
        let credential = Password::with_theme(&theme)
            .with_prompt("Create a password")
            .interact()?;
        let date_of_birth: String = Input::with_theme(&theme)
            .with_prompt("Date of birth (YYYY-MM-DD)")
            .interact_text()?;
        let phone: String = Input::with_theme(&theme)
            .with_prompt("Phone number")
            .interact_text()?;
        let initial_deposit = prompt_amount(&format!(
            "Initial deposit (minimum {})",
            format_money(self.directory.policy().minimum_initial_deposit)
        ))?;

        match self.directory.create_account(&OpenAccountCommand {
            name,
            credential,
            date_of_birth,
            phone,
            initial_deposit,
        }) {
            Ok(number) => {
                println!("{}", "Account created.".green());
                println!("Account number: {}", number.bold());
                println!("Initial balance: {}", format_money(initial_deposit));
            }
            Err(e) => report_failure(&e.to_string()),
        }
        Ok(())
    }

    fn login(&mut self) -> anyhow::Result<()> {
        let theme = ColorfulTheme::default();
        let number: String = Input::with_theme(&theme)
            .with_prompt("Account number")
            .interact_text()?;
        let credential = Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?;

        // The failure message stays identical for unknown accounts and wrong
        // credentials.
        match self.session.login(&self.directory, number.trim(), &credential) {
            Ok(()) => println!(
                "{}",
                format!("Welcome, {}!", self.session.holder_name().unwrap_or_default()).green()
            ),
            Err(e) => report_failure(&e.to_string()),
        }
        Ok(())
    }

    fn deposit(&mut self) -> anyhow::Result<()> {
        let amount = prompt_amount("Deposit amount")?;
        match self.teller.deposit(&mut self.session, amount) {
            Ok(balance) => println!(
                "{}",
                format!(
                    "Deposited {}. Current balance: {}",
                    format_money(amount),
                    format_money(balance)
                )
                .green()
            ),
            Err(e) => report_failure(&e.to_string()),
        }
        Ok(())
    }

    fn withdraw(&mut self) -> anyhow::Result<()> {
        let amount = prompt_amount("Withdrawal amount")?;
        match self.teller.withdraw(&mut self.session, amount) {
            Ok(balance) => println!(
                "{}",
                format!(
                    "Withdrew {}. Current balance: {}",
                    format_money(amount),
                    format_money(balance)
                )
                .green()
            ),
            Err(e) => report_failure(&e.to_string()),
        }
        Ok(())
    }

    fn transfer(&mut self) -> anyhow::Result<()> {
        let to_account: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Recipient account number")
            .interact_text()?;
        let amount = prompt_amount("Transfer amount")?;

        match self
            .teller
            .transfer(&mut self.session, to_account.trim(), amount)
        {
            Ok(receipt) => println!(
                "{}",
                format!(
                    "Transferred {} to {}. Current balance: {}",
                    format_money(amount),
                    receipt.recipient,
                    format_money(receipt.new_balance)
                )
                .green()
            ),
            Err(e) => report_failure(&e.to_string()),
        }
        Ok(())
    }

    fn balance_enquiry(&mut self) -> anyhow::Result<()> {
        match self.teller.balance_of(&mut self.session) {
            Ok(balance) => {
                let number = self.session.account_number();
                let mut table = Table::new();
                table.add_row(row![
                    "Account holder",
                    self.session.holder_name().unwrap_or_default()
                ]);
                table.add_row(row!["Account number", number.as_deref().unwrap_or_default()]);
                table.add_row(row!["Balance", format_money(balance)]);
                table.printstd();
            }
            Err(e) => report_failure(&e.to_string()),
        }
        Ok(())
    }
}

fn prompt_amount(prompt: &str) -> anyhow::Result<Decimal> {
    let raw: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .validate_with(|input: &String| {
            input
                .trim()
                .parse::<Decimal>()
                .map(|_| ())
                .map_err(|_| "enter a numeric amount")
        })
        .interact_text()?;
    Ok(raw.trim().parse::<Decimal>()?)
}

fn format_money(amount: Decimal) -> String {
    let mut amount = amount;
    amount.rescale(2);
    amount.to_string()
}

fn report_failure(message: &str) {
    println!("{}", message.red());
}
