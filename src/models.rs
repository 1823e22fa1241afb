use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ConsoleError;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
}

impl Profile {
    /// Pull a display name and email out of whatever user object the login
    /// endpoint returned.
    pub fn from_user_data(user: &Value) -> Self {
        let name = str_at(user, &["name"])
            .or_else(|| str_at(user, &["user", "name"]))
            .or_else(|| str_at(user, &["username"]))
            .unwrap_or("User");
        let email = str_at(user, &["email"])
            .or_else(|| str_at(user, &["user", "email"]))
            .unwrap_or("User");
        Self {
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: String,
    pub profile: Profile,
}

// ---------------------------------------------------------------------------
// Roles & permissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permission_keys: Vec<String>,
}

impl Role {
    pub fn from_value(v: &Value) -> Option<Self> {
        let id = id_at(v)?;
        let name = str_at(v, &["roleName"])
            .or_else(|| str_at(v, &["name"]))
            .unwrap_or_default()
            .to_string();

        let permission_keys = if let Some(perms) = v.get("permissions").and_then(Value::as_array) {
            perms
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.clone()),
                    other => str_at(other, &["key"])
                        .or_else(|| str_at(other, &["value"]))
                        .map(str::to_string),
                })
                .collect()
        } else if let Some(keys) = v.get("permissionKeys").and_then(Value::as_array) {
            keys.iter()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        } else {
            Vec::new()
        };

        Some(Self {
            id,
            name,
            permission_keys,
        })
    }

    pub fn has_permission(&self, key: &str) -> bool {
        self.permission_keys.iter().any(|k| k == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub id: String,
    pub key: String,
    pub label: String,
}

impl Permission {
    pub fn from_value(v: &Value) -> Option<Self> {
        let id = id_at(v)?;
        let key = str_at(v, &["key"])
            .or_else(|| str_at(v, &["value"]))
            .unwrap_or_default()
            .to_string();
        let label = str_at(v, &["value"])
            .or_else(|| str_at(v, &["key"]))
            .or_else(|| str_at(v, &["name"]))
            .unwrap_or("Unnamed Permission")
            .to_string();
        Some(Self { id, key, label })
    }
}

/// Walk `path` through nested objects and return a non-empty string.
pub(crate) fn str_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = v;
    for segment in path {
        cur = cur.get(segment)?;
    }
    cur.as_str().filter(|s| !s.is_empty())
}

fn id_at(v: &Value) -> Option<String> {
    ["_id", "id"].iter().find_map(|k| match v.get(k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Salary,
    #[serde(alias = "misc cost")]
    MiscCost,
}

impl TransactionType {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Salary => "Salary",
            TransactionType::MiscCost => "Misc Cost",
        }
    }

    pub fn is_expense(&self) -> bool {
        matches!(self, TransactionType::Salary | TransactionType::MiscCost)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TransactionType {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "income" => Ok(TransactionType::Income),
            "salary" => Ok(TransactionType::Salary),
            "misc_cost" | "misc" => Ok(TransactionType::MiscCost),
            "" => Err(ConsoleError::validation("Transaction type is required")),
            _ => Err(ConsoleError::validation("Select a transaction type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    #[serde(alias = "Bank")]
    Bank,
    #[serde(alias = "Cash")]
    Cash,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Bank => "bank",
            PaymentMode::Cash => "cash",
        }
    }
}

impl FromStr for PaymentMode {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank" => Ok(PaymentMode::Bank),
            "cash" => Ok(PaymentMode::Cash),
            "" => Err(ConsoleError::validation("Payment mode is required")),
            other => Err(ConsoleError::validation(format!(
                "Unknown payment mode: {other} (expected bank or cash)"
            ))),
        }
    }
}

/// The type of a transaction together with the field only that type carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    Income {
        #[serde(rename = "incomeFrom", alias = "Income_From")]
        source: String,
    },
    Salary {
        #[serde(rename = "employeeName")]
        employee_name: String,
    },
    #[serde(alias = "misc cost")]
    MiscCost,
}

impl TransactionKind {
    pub fn tx_type(&self) -> TransactionType {
        match self {
            TransactionKind::Income { .. } => TransactionType::Income,
            TransactionKind::Salary { .. } => TransactionType::Salary,
            TransactionKind::MiscCost => TransactionType::MiscCost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub title: String,
    #[serde(deserialize_with = "de_amount")]
    pub amount: f64,
    #[serde(with = "day_format")]
    pub date: NaiveDate,
    pub payment_mode: PaymentMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn tx_type(&self) -> TransactionType {
        self.kind.tx_type()
    }

    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            TransactionKind::Income { source } => Some(source),
            _ => None,
        }
    }

    pub fn employee_name(&self) -> Option<&str> {
        match &self.kind {
            TransactionKind::Salary { employee_name } => Some(employee_name),
            _ => None,
        }
    }

    /// Income source or employee name, `-` when the type has neither.
    pub fn counterparty(&self) -> &str {
        self.source()
            .or_else(|| self.employee_name())
            .filter(|s| !s.is_empty())
            .unwrap_or("-")
    }
}

/// Parse a calendar day written as `YYYY-MM-DD` or `DD-MM-YYYY`.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d-%m-%Y"))
        .ok()
}

mod day_format {
    use chrono::NaiveDate;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_day(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
    }
}

fn de_amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(d)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid amount: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_fallbacks() {
        let p = Profile::from_user_data(&json!({"name": "Asha", "email": "asha@example.com"}));
        assert_eq!(p.name, "Asha");
        assert_eq!(p.email, "asha@example.com");

        let nested = Profile::from_user_data(&json!({"user": {"name": "Ravi", "email": "r@x.in"}}));
        assert_eq!(nested.name, "Ravi");
        assert_eq!(nested.email, "r@x.in");

        let bare = Profile::from_user_data(&json!({"username": "admin"}));
        assert_eq!(bare.name, "admin");
        assert_eq!(bare.email, "User");
    }

    #[test]
    fn test_role_from_permission_keys() {
        let role = Role::from_value(&json!({
            "_id": "r1", "roleName": "HR", "permissionKeys": ["employee.read", "employee.write"]
        }))
        .unwrap();
        assert_eq!(role.id, "r1");
        assert_eq!(role.name, "HR");
        assert!(role.has_permission("employee.write"));
    }

    #[test]
    fn test_role_from_permission_objects() {
        let role = Role::from_value(&json!({
            "id": 7, "name": "Manager",
            "permissions": ["a", {"key": "b"}, {"value": "c"}, {"label": "ignored"}]
        }))
        .unwrap();
        assert_eq!(role.id, "7");
        assert_eq!(role.name, "Manager");
        assert_eq!(role.permission_keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_role_without_id_is_rejected() {
        assert!(Role::from_value(&json!({"roleName": "Ghost"})).is_none());
    }

    #[test]
    fn test_permission_labels() {
        let p = Permission::from_value(&json!({"_id": "p1", "key": "role.add"})).unwrap();
        assert_eq!(p.key, "role.add");
        assert_eq!(p.label, "role.add");
        let p = Permission::from_value(&json!({"_id": "p2", "value": "Add Role"})).unwrap();
        assert_eq!(p.key, "Add Role");
        assert_eq!(p.label, "Add Role");
        let p = Permission::from_value(&json!({"_id": "p3"})).unwrap();
        assert_eq!(p.label, "Unnamed Permission");
    }

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!("income".parse::<TransactionType>().unwrap(), TransactionType::Income);
        assert_eq!("Misc Cost".parse::<TransactionType>().unwrap(), TransactionType::MiscCost);
        assert_eq!("misc-cost".parse::<TransactionType>().unwrap(), TransactionType::MiscCost);
        let err = "rent".parse::<TransactionType>().unwrap_err();
        assert_eq!(err.to_string(), "Select a transaction type");
    }

    #[test]
    fn test_parse_day_accepts_both_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(parse_day("2025-03-09"), Some(d));
        assert_eq!(parse_day("09-03-2025"), Some(d));
        assert_eq!(parse_day("03/09/2025"), None);
    }

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction {
            id: "1700000000000".to_string(),
            kind: TransactionKind::Salary {
                employee_name: "Meena".to_string(),
            },
            title: "March salary".to_string(),
            amount: 400.0,
            date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            payment_mode: PaymentMode::Bank,
            created_at: None,
            updated_at: None,
        };
        let v = serde_json::to_value(&tx).unwrap();
        assert_eq!(v["type"], "salary");
        assert_eq!(v["employeeName"], "Meena");
        assert_eq!(v["paymentMode"], "bank");
        assert_eq!(v["date"], "2025-03-31");
        assert!(v.get("incomeFrom").is_none());
    }

    #[test]
    fn test_reads_legacy_stored_records() {
        let raw = json!({
            "id": "1", "type": "misc cost", "Income_From": "", "employeeName": "",
            "title": "Tea", "amount": "120", "date": "05-01-2025", "paymentMode": "cash"
        });
        let tx: Transaction = serde_json::from_value(raw).unwrap();
        assert_eq!(tx.tx_type(), TransactionType::MiscCost);
        assert_eq!(tx.amount, 120.0);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        assert_eq!(tx.counterparty(), "-");

        let raw = json!({
            "id": "2", "type": "income", "Income_From": "Acme", "title": "Invoice",
            "amount": 1000, "date": "2025-01-06", "paymentMode": "bank"
        });
        let tx: Transaction = serde_json::from_value(raw).unwrap();
        assert_eq!(tx.source(), Some("Acme"));
        assert_eq!(tx.employee_name(), None);
    }
}
