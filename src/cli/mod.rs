pub mod init;
pub mod ledger;
pub mod roles;
pub mod session;
pub mod status;

use std::io::Write;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::api::HrApi;
use crate::db::get_connection;
use crate::error::{ConsoleError, Result};
use crate::models::{parse_day, Session};
use crate::session::SessionGate;
use crate::settings::Settings;

pub(crate) fn open_store(settings: &Settings) -> Result<Connection> {
    get_connection(&settings.db_path())
}

/// Resolve the session gate and fail unless someone is logged in.
pub(crate) fn require_session(conn: &Connection) -> Result<Session> {
    let gate = SessionGate::load(conn)?;
    Ok(gate.session()?.clone())
}

pub(crate) fn authorized_api(settings: &Settings, session: &Session) -> Result<HrApi> {
    Ok(HrApi::new(&settings.effective_api_url())?.with_token(session.credential.clone()))
}

pub(crate) fn parse_date_arg(value: &str) -> Result<NaiveDate> {
    parse_day(value).ok_or_else(|| {
        ConsoleError::validation(format!("Invalid date: {value} (use YYYY-MM-DD or DD-MM-YYYY)"))
    })
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[derive(Parser)]
#[command(
    name = "hrconsole",
    version,
    about = "Admin console for the HR service: roles, permissions and a local budget ledger."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and API endpoint, and create the local store.
    Init {
        /// Path for local data (default: ~/.local/share/hrconsole)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Base URL of the HR API
        #[arg(long = "api-url")]
        api_url: Option<String>,
        /// Roles shown per page
        #[arg(long = "page-size")]
        page_size: Option<u32>,
    },
    /// Show configuration, session and ledger status.
    Status,
    /// Log in and store the session locally.
    Login {
        /// Account email address
        #[arg(long)]
        email: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Log out and clear the stored session.
    Logout {
        /// Also delete the local transaction ledger
        #[arg(long)]
        purge: bool,
    },
    /// Ask the server to email a password reset link.
    ForgotPassword {
        /// Registered email address
        email: String,
    },
    /// Set a new password using the token from a reset email.
    ResetPassword {
        /// Reset token from the email link
        #[arg(long)]
        token: String,
    },
    /// Manage roles.
    Roles {
        #[command(subcommand)]
        command: RolesCommands,
    },
    /// List the permission catalogue.
    Permissions,
    /// Record and summarize budget transactions.
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
}

#[derive(Subcommand)]
pub enum RolesCommands {
    /// List one page of roles.
    List {
        /// Page number (default: the last page viewed)
        #[arg(long)]
        page: Option<u32>,
        /// Only show roles on this page whose name contains TERM
        #[arg(long)]
        search: Option<String>,
    },
    /// Show the next page of roles.
    Next,
    /// Show the previous page of roles.
    Prev,
    /// Show a role and its permissions.
    View {
        /// Role ID (shown in `hrconsole roles list`)
        id: String,
    },
    /// Add a role.
    Add {
        /// Role name
        name: String,
        /// Permission key or ID to grant (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
    /// Update a role on the current page.
    Update {
        /// Role ID (shown in `hrconsole roles list`)
        id: String,
        /// New role name
        #[arg(long)]
        name: Option<String>,
        /// Replace the permissions with these keys or IDs (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Remove every permission from the role
        #[arg(long = "clear-permissions", conflicts_with = "permissions")]
        clear_permissions: bool,
    },
    /// Delete a role on the current page.
    Delete {
        /// Role ID (shown in `hrconsole roles list`)
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Record a transaction.
    Add {
        /// Transaction type: income, salary, misc_cost
        #[arg(long = "type", default_value = "income")]
        tx_type: String,
        /// Short description
        #[arg(long)]
        title: Option<String>,
        /// Amount (must be greater than zero)
        #[arg(long, allow_negative_numbers = true)]
        amount: Option<f64>,
        /// Date: YYYY-MM-DD or DD-MM-YYYY (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Payment mode: bank, cash
        #[arg(long = "payment-mode")]
        payment_mode: Option<String>,
        /// Where income came from (income only)
        #[arg(long)]
        source: Option<String>,
        /// Employee paid (salary only)
        #[arg(long)]
        employee: Option<String>,
    },
    /// Edit a transaction; omitted fields keep their values.
    Edit {
        /// Transaction ID (shown in `hrconsole ledger list`)
        id: String,
        #[arg(long = "type")]
        tx_type: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        amount: Option<f64>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long = "payment-mode")]
        payment_mode: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        employee: Option<String>,
    },
    /// Delete a transaction.
    Delete {
        /// Transaction ID (shown in `hrconsole ledger list`)
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// List transactions, optionally filtered.
    List {
        /// Quick range: today, week, month, all
        #[arg(long)]
        range: Option<String>,
        /// Start date: YYYY-MM-DD or DD-MM-YYYY
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD or DD-MM-YYYY
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Transaction type: income, salary, misc_cost
        #[arg(long = "type")]
        tx_type: Option<String>,
    },
    /// Total income, expenses and net across the whole ledger.
    Summary,
}
