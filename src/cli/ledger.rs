use chrono::{Local, NaiveDate, Utc};
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{confirm, open_store, parse_date_arg, require_session};
use crate::error::Result;
use crate::filter::{Filter, QuickRange};
use crate::fmt::{day, money};
use crate::ledger::{DraftPatch, Ledger, Summary, TransactionDraft};
use crate::models::{PaymentMode, Transaction, TransactionType};
use crate::settings::load_settings;

/// Raw field values as typed on the command line.
#[derive(Debug, Default)]
pub struct FieldArgs {
    pub tx_type: Option<String>,
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub payment_mode: Option<String>,
    pub source: Option<String>,
    pub employee: Option<String>,
}

impl FieldArgs {
    fn into_patch(self) -> Result<DraftPatch> {
        Ok(DraftPatch {
            tx_type: self.tx_type.as_deref().map(str::parse::<TransactionType>).transpose()?,
            source: self.source,
            employee_name: self.employee,
            title: self.title,
            amount: self.amount,
            date: self.date.as_deref().map(parse_date_arg).transpose()?,
            payment_mode: self
                .payment_mode
                .as_deref()
                .map(str::parse::<PaymentMode>)
                .transpose()?,
        })
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_transaction(tx: &Transaction) {
    println!("ID:           {}", tx.id);
    println!("Type:         {}", tx.tx_type());
    match tx.tx_type() {
        TransactionType::Income => println!("Income from:  {}", tx.counterparty()),
        TransactionType::Salary => println!("Employee:     {}", tx.counterparty()),
        TransactionType::MiscCost => {}
    }
    println!("Title:        {}", tx.title);
    println!("Amount:       {}", money(tx.amount));
    println!("Date:         {}", day(tx.date));
    println!("Payment mode: {}", tx.payment_mode.as_str());
}

pub fn add(fields: FieldArgs) -> Result<()> {
    let settings = load_settings();
    let conn = open_store(&settings)?;
    require_session(&conn)?;

    let mut ledger = Ledger::load(&conn)?;
    let mut draft = TransactionDraft::blank(today());
    draft.apply(fields.into_patch()?);
    let tx = ledger.add(&conn, &draft, Utc::now())?;

    println!("{}", "Transaction added.".green());
    print_transaction(tx);
    Ok(())
}

pub fn edit(id: &str, fields: FieldArgs) -> Result<()> {
    let settings = load_settings();
    let conn = open_store(&settings)?;
    require_session(&conn)?;

    let mut ledger = Ledger::load(&conn)?;
    let patch = fields.into_patch()?;
    if patch == DraftPatch::default() {
        println!("Nothing to change.");
        print_transaction(ledger.get(id)?);
        return Ok(());
    }

    ledger.begin_edit(id)?;
    ledger.update_draft(patch)?;
    if let Some(buffer) = ledger.editing() {
        log::debug!("editing {}: {:?}", buffer.id, buffer.draft);
    }
    let id = match ledger.commit_edit(&conn, Utc::now()) {
        Ok(tx) => tx.id.clone(),
        Err(e) => {
            ledger.cancel_edit();
            return Err(e);
        }
    };

    println!("{}", "Transaction updated.".green());
    print_transaction(ledger.get(&id)?);
    Ok(())
}

pub fn delete(id: &str, yes: bool) -> Result<()> {
    let settings = load_settings();
    let conn = open_store(&settings)?;
    require_session(&conn)?;

    let mut ledger = Ledger::load(&conn)?;
    let tx = ledger.get(id)?;
    let prompt = format!(
        "Delete '{}' ({}, {})?",
        tx.title,
        money(tx.amount),
        day(tx.date)
    );
    if !yes && !confirm(&prompt)? {
        println!("Cancelled.");
        return Ok(());
    }
    let removed = ledger.delete(&conn, id)?;
    println!("{}", format!("Deleted: {}", removed.title).green());
    Ok(())
}

/// Build a filter from the list flags. The quick range goes first so that
/// explicit dates can narrow it.
fn build_filter(
    range: Option<&str>,
    from_date: Option<&str>,
    to_date: Option<&str>,
    tx_type: Option<&str>,
    today: NaiveDate,
) -> Result<Filter> {
    let mut filter = Filter::default();
    if let Some(r) = range {
        filter.apply_quick_range(r.parse::<QuickRange>()?, today);
    }
    if let Some(d) = from_date {
        filter.set_start(Some(parse_date_arg(d)?));
    }
    if let Some(d) = to_date {
        filter.set_end(Some(parse_date_arg(d)?));
    }
    if let Some(t) = tx_type {
        filter.set_type(Some(t.parse()?));
    }
    Ok(filter)
}

fn amount_cell(tx: &Transaction) -> String {
    if tx.tx_type().is_expense() {
        money(tx.amount).red().to_string()
    } else {
        money(tx.amount).green().to_string()
    }
}

pub fn list(
    range: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    tx_type: Option<String>,
) -> Result<()> {
    let settings = load_settings();
    let conn = open_store(&settings)?;
    require_session(&conn)?;

    let filter = build_filter(
        range.as_deref(),
        from_date.as_deref(),
        to_date.as_deref(),
        tx_type.as_deref(),
        today(),
    )?;
    let ledger = Ledger::load(&conn)?;
    let rows = ledger.list(&filter);

    if rows.is_empty() {
        if filter.is_active() {
            println!("No transactions match the filter.");
        } else {
            println!("No transactions yet. Add one with `hrconsole ledger add`.");
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Type", "Name/Source", "Title", "Amount", "Payment Mode", "ID"]);
    for tx in &rows {
        table.add_row(vec![
            Cell::new(day(tx.date)),
            Cell::new(tx.tx_type()),
            Cell::new(tx.counterparty()),
            Cell::new(&tx.title),
            Cell::new(amount_cell(tx)),
            Cell::new(tx.payment_mode.as_str()),
            Cell::new(&tx.id),
        ]);
    }
    println!("{table}");

    let count = format!("{} record(s)", rows.len());
    if filter.is_active() {
        let mut parts = Vec::new();
        if let Some(r) = filter.quick_range.filter(|r| *r != QuickRange::All) {
            parts.push(format!("range {r}"));
        }
        if let Some(s) = filter.start {
            parts.push(format!("from {}", day(s)));
        }
        if let Some(e) = filter.end {
            parts.push(format!("to {}", day(e)));
        }
        if let Some(t) = filter.tx_type {
            parts.push(format!("type {t}"));
        }
        println!("{count} (filtered: {})", parts.join(", "));
    } else {
        println!("{count}");
    }
    Ok(())
}

fn summary_table(s: &Summary) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["", "Amount"]);
    table.add_row(vec![
        Cell::new("Total Income".green().bold()),
        Cell::new(money(s.total_income)),
    ]);
    table.add_row(vec![
        Cell::new("Total Expenses".red().bold()),
        Cell::new(money(s.total_expenses)),
    ]);
    let net_label = if s.is_profit() {
        "Net Profit".green().bold()
    } else {
        "Net Loss".red().bold()
    };
    table.add_row(vec![Cell::new(net_label), Cell::new(money(s.net.abs()))]);
    table
}

pub fn summary() -> Result<()> {
    let settings = load_settings();
    let conn = open_store(&settings)?;
    require_session(&conn)?;

    let ledger = Ledger::load(&conn)?;
    let s = ledger.summary();
    println!(
        "Budget Summary ({} transactions)\n{}",
        ledger.transactions().len(),
        summary_table(&s)
    );
    Ok(())
}
