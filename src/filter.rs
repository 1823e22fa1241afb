use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};

use crate::error::ConsoleError;
use crate::models::{Transaction, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickRange {
    Today,
    Week,
    Month,
    All,
}

impl QuickRange {
    /// Start and end day for this preset relative to `today`. Weeks run
    /// Sunday through Saturday.
    pub fn bounds(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self {
            QuickRange::All => (None, None),
            QuickRange::Today => (Some(today), Some(today)),
            QuickRange::Week => {
                let offset = u64::from(today.weekday().num_days_from_sunday());
                let start = today - Days::new(offset);
                (Some(start), Some(start + Days::new(6)))
            }
            QuickRange::Month => {
                let first = today.with_day(1);
                let next_first = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
                };
                (first, next_first.and_then(|d| d.pred_opt()))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuickRange::Today => "today",
            QuickRange::Week => "week",
            QuickRange::Month => "month",
            QuickRange::All => "all",
        }
    }
}

impl fmt::Display for QuickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuickRange {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(QuickRange::Today),
            "week" | "this-week" => Ok(QuickRange::Week),
            "month" | "this-month" => Ok(QuickRange::Month),
            "all" | "all-time" => Ok(QuickRange::All),
            other => Err(ConsoleError::validation(format!(
                "Unknown range: {other} (expected today, week, month or all)"
            ))),
        }
    }
}

/// Transient view filter over the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub tx_type: Option<TransactionType>,
    pub quick_range: Option<QuickRange>,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            tx_type: None,
            quick_range: Some(QuickRange::All),
        }
    }
}

impl Filter {
    /// Overwrite both date bounds from a preset. The type filter is kept.
    pub fn apply_quick_range(&mut self, range: QuickRange, today: NaiveDate) {
        let (start, end) = range.bounds(today);
        self.start = start;
        self.end = end;
        self.quick_range = Some(range);
    }

    pub fn set_start(&mut self, start: Option<NaiveDate>) {
        self.start = start;
        self.quick_range = None;
    }

    pub fn set_end(&mut self, end: Option<NaiveDate>) {
        self.end = end;
        self.quick_range = None;
    }

    pub fn set_type(&mut self, tx_type: Option<TransactionType>) {
        self.tx_type = tx_type;
    }

    pub fn is_active(&self) -> bool {
        self.start.is_some() || self.end.is_some() || self.tx_type.is_some()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.start.map_or(true, |s| tx.date >= s)
            && self.end.map_or(true, |e| tx.date <= e)
            && self.tx_type.map_or(true, |t| tx.tx_type() == t)
    }

    pub fn apply<'a>(&self, txs: &'a [Transaction]) -> Vec<&'a Transaction> {
        txs.iter().filter(|tx| self.matches(tx)).collect()
    }
}
