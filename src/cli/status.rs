use std::path::PathBuf;

use crate::db::{self, get_connection, KEY_CURRENT_PAGE};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::ledger::Ledger;
use crate::session::{SessionGate, SessionState};
use crate::settings::{load_settings, settings_file_exists};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = PathBuf::from(&settings.data_dir);
    let db_path = settings.db_path();

    println!("API:        {}", settings.effective_api_url());
    println!("Page size:  {}", settings.page_size);
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        if settings_file_exists() {
            println!("Database not found. Run `hrconsole login` or `hrconsole init` to create it.");
        } else {
            println!("Not set up yet. Run `hrconsole init` to set up.");
        }
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    println!("Keys:       {}", db::count_items(&conn)?);
    let gate = SessionGate::load(&conn)?;
    println!();
    match gate.state() {
        SessionState::Authenticated(session) => {
            println!("User:       {} <{}>", session.profile.name, session.profile.email);
            let page = db::get_item(&conn, KEY_CURRENT_PAGE)?;
            println!("Roles page: {}", page.as_deref().unwrap_or("1"));
        }
        _ => println!("User:       (not logged in)"),
    }

    match Ledger::load(&conn) {
        Ok(ledger) => println!("Transactions: {}", ledger.transactions().len()),
        Err(e) => println!("Transactions: unreadable ({e})"),
    }
    Ok(())
}
