use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

use crate::db::{self, KEY_TRANSACTIONS};
use crate::error::{ConsoleError, Result};
use crate::filter::Filter;
use crate::models::{PaymentMode, Transaction, TransactionKind, TransactionType};

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// Unvalidated form state for a transaction being added or edited.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub tx_type: Option<TransactionType>,
    pub source: String,
    pub employee_name: String,
    pub title: String,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub payment_mode: Option<PaymentMode>,
}

impl TransactionDraft {
    /// Blank form: income, dated `today`.
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            tx_type: Some(TransactionType::Income),
            source: String::new(),
            employee_name: String::new(),
            title: String::new(),
            amount: None,
            date: Some(today),
            payment_mode: None,
        }
    }

    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            tx_type: Some(tx.tx_type()),
            source: tx.source().unwrap_or_default().to_string(),
            employee_name: tx.employee_name().unwrap_or_default().to_string(),
            title: tx.title.clone(),
            amount: Some(tx.amount),
            date: Some(tx.date),
            payment_mode: Some(tx.payment_mode),
        }
    }

    pub fn apply(&mut self, patch: DraftPatch) {
        if let Some(t) = patch.tx_type {
            self.tx_type = Some(t);
        }
        if let Some(s) = patch.source {
            self.source = s;
        }
        if let Some(e) = patch.employee_name {
            self.employee_name = e;
        }
        if let Some(t) = patch.title {
            self.title = t;
        }
        if let Some(a) = patch.amount {
            self.amount = Some(a);
        }
        if let Some(d) = patch.date {
            self.date = Some(d);
        }
        if let Some(m) = patch.payment_mode {
            self.payment_mode = Some(m);
        }
    }

    /// Check the form rules and produce the typed pieces of a transaction.
    pub fn validate(&self) -> Result<ValidDraft> {
        let tx_type = self
            .tx_type
            .ok_or_else(|| ConsoleError::validation("Transaction type is required"))?;
        let kind = match tx_type {
            TransactionType::Income => TransactionKind::Income {
                source: required(&self.source, "Income from is required")?,
            },
            TransactionType::Salary => TransactionKind::Salary {
                employee_name: required(&self.employee_name, "Employee name is required")?,
            },
            TransactionType::MiscCost => TransactionKind::MiscCost,
        };
        let title = required(&self.title, "Title is required")?;
        let amount = self
            .amount
            .ok_or_else(|| ConsoleError::validation("Amount is required"))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ConsoleError::validation("Amount must be greater than zero"));
        }
        let date = self
            .date
            .ok_or_else(|| ConsoleError::validation("Date is required"))?;
        let payment_mode = self
            .payment_mode
            .ok_or_else(|| ConsoleError::validation("Payment mode is required"))?;

        Ok(ValidDraft {
            kind,
            title,
            amount,
            date,
            payment_mode,
        })
    }
}

fn required(value: &str, msg: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::validation(msg));
    }
    Ok(trimmed.to_string())
}

/// Field changes to merge into a draft; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftPatch {
    pub tx_type: Option<TransactionType>,
    pub source: Option<String>,
    pub employee_name: Option<String>,
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub payment_mode: Option<PaymentMode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    pub kind: TransactionKind,
    pub title: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub payment_mode: PaymentMode,
}

/// The single transaction currently being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    pub id: String,
    pub draft: TransactionDraft,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net: f64,
}

impl Summary {
    pub fn of(txs: &[Transaction]) -> Self {
        let total_income: f64 = txs
            .iter()
            .filter(|t| t.tx_type() == TransactionType::Income)
            .map(|t| t.amount)
            .sum();
        let total_expenses: f64 = txs
            .iter()
            .filter(|t| t.tx_type().is_expense())
            .map(|t| t.amount)
            .sum();
        Self {
            total_income,
            total_expenses,
            net: total_income - total_expenses,
        }
    }

    pub fn is_profit(&self) -> bool {
        self.net >= 0.0
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Locally persisted transaction list with a single edit buffer.
#[derive(Debug, Default)]
pub struct Ledger {
    transactions: Vec<Transaction>,
    editing: Option<EditBuffer>,
}

impl Ledger {
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            editing: None,
        }
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        let transactions = match db::get_item(conn, KEY_TRANSACTIONS)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        };
        Ok(Self::from_transactions(transactions))
    }

    fn persist(conn: &Connection, transactions: &[Transaction]) -> Result<()> {
        db::set_item(conn, KEY_TRANSACTIONS, &serde_json::to_string(transactions)?)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn get(&self, id: &str) -> Result<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ConsoleError::NotFound(format!("No transaction with ID {id}")))
    }

    /// Millisecond timestamp, bumped past the newest existing id.
    fn next_id(&self, now: DateTime<Utc>) -> String {
        let stamp = now.timestamp_millis();
        let newest = self
            .transactions
            .iter()
            .filter_map(|t| t.id.parse::<i64>().ok())
            .max()
            .unwrap_or(i64::MIN);
        stamp.max(newest.saturating_add(1)).to_string()
    }

    pub fn add(&mut self, conn: &Connection, draft: &TransactionDraft, now: DateTime<Utc>) -> Result<&Transaction> {
        let valid = draft.validate()?;
        let tx = Transaction {
            id: self.next_id(now),
            kind: valid.kind,
            title: valid.title,
            amount: valid.amount,
            date: valid.date,
            payment_mode: valid.payment_mode,
            created_at: Some(now),
            updated_at: None,
        };
        let mut next = self.transactions.clone();
        next.push(tx);
        Self::persist(conn, &next)?;
        self.transactions = next;
        log::debug!("ledger: added {}", self.transactions.len());
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    /// Load `id` into the edit buffer, replacing any edit in progress.
    pub fn begin_edit(&mut self, id: &str) -> Result<&EditBuffer> {
        let draft = TransactionDraft::from_transaction(self.get(id)?);
        if let Some(prev) = &self.editing {
            log::debug!("ledger: abandoning edit of {}", prev.id);
        }
        Ok(&*self.editing.insert(EditBuffer {
            id: id.to_string(),
            draft,
        }))
    }

    pub fn editing(&self) -> Option<&EditBuffer> {
        self.editing.as_ref()
    }

    pub fn update_draft(&mut self, patch: DraftPatch) -> Result<()> {
        let buffer = self
            .editing
            .as_mut()
            .ok_or_else(|| ConsoleError::validation("No transaction is being edited"))?;
        buffer.draft.apply(patch);
        Ok(())
    }

    /// Validate the buffer and write it over the stored record. The buffer
    /// is cleared only when the write succeeds.
    pub fn commit_edit(&mut self, conn: &Connection, now: DateTime<Utc>) -> Result<&Transaction> {
        let buffer = self
            .editing
            .as_ref()
            .ok_or_else(|| ConsoleError::validation("No transaction is being edited"))?;
        let valid = buffer.draft.validate()?;
        let index = self
            .transactions
            .iter()
            .position(|t| t.id == buffer.id)
            .ok_or_else(|| ConsoleError::NotFound(format!("No transaction with ID {}", buffer.id)))?;

        let mut next = self.transactions.clone();
        let target = &mut next[index];
        target.kind = valid.kind;
        target.title = valid.title;
        target.amount = valid.amount;
        target.date = valid.date;
        target.payment_mode = valid.payment_mode;
        target.updated_at = Some(now);

        Self::persist(conn, &next)?;
        self.transactions = next;
        self.editing = None;
        Ok(&self.transactions[index])
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn delete(&mut self, conn: &Connection, id: &str) -> Result<Transaction> {
        let index = self
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ConsoleError::NotFound(format!("No transaction with ID {id}")))?;
        let mut next = self.transactions.clone();
        let removed = next.remove(index);
        Self::persist(conn, &next)?;
        self.transactions = next;
        if self.editing.as_ref().is_some_and(|b| b.id == id) {
            self.editing = None;
        }
        Ok(removed)
    }

    pub fn list(&self, filter: &Filter) -> Vec<&Transaction> {
        filter.apply(&self.transactions)
    }

    /// Totals over the whole ledger, regardless of any active filter.
    pub fn summary(&self) -> Summary {
        Summary::of(&self.transactions)
    }
}
