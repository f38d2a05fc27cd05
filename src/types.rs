//! Core types and data structures for bank reconciliation under RESICO

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a bank movement, from the taxpayer's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money in
    Ingreso,
    /// Money out
    Egreso,
}

impl TransactionType {
    /// The only invoice type a movement in this direction can settle.
    /// Money in pays an invoice we issued; money out pays one we received.
    pub fn expected_invoice_type(&self) -> InvoiceType {
        match self {
            TransactionType::Ingreso => InvoiceType::Emitida,
            TransactionType::Egreso => InvoiceType::Recibida,
        }
    }
}

/// Invoice direction, from the taxpayer's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceType {
    /// Issued by the taxpayer
    Emitida,
    /// Received by the taxpayer
    Recibida,
}

/// SAT status of a CFDI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Vigente,
    Cancelado,
}

/// How a transaction got linked to its invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Auto,
    Manual,
}

/// A monthly billing period, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a period, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> ResicoResult<Self> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(ResicoError::InvalidPeriod(format!("{:04}-{:02}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// Period a calendar date belongs to
    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The period immediately after this one
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First calendar day of the period
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the period
    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether a date falls inside the period
    pub fn contains(&self, date: NaiveDate) -> bool {
        Period::of_date(date) == *self
    }

    /// Monthly ISR/IVA filing deadline: the 17th of the following month
    pub fn payment_deadline(&self) -> NaiveDate {
        let next = self.next();
        NaiveDate::from_ymd_opt(next.year, next.month, 17).unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ResicoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResicoError::InvalidPeriod(s.to_string());

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4
            || month.len() != 2
            || !year.chars().chain(month.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Period::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = ResicoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// An uploaded bank statement; owns the transactions extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatement {
    pub id: String,
    pub user_id: String,
    pub bank_id: String,
    pub period: Period,
}

impl BankStatement {
    pub fn new(id: String, user_id: String, bank_id: String, period: Period) -> Self {
        Self {
            id,
            user_id,
            bank_id,
            period,
        }
    }
}

/// A single bank movement extracted from a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Unique identifier for the movement
    pub id: String,
    /// Statement the movement was extracted from
    pub statement_id: String,
    /// Posting date
    pub date: NaiveDate,
    /// Free-text description as printed by the bank
    pub description: String,
    /// Non-negative magnitude of the movement
    pub amount: BigDecimal,
    /// Money in or money out
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// RFC of the other party, when the bank reports it
    #[serde(default)]
    pub counterparty_rfc: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Invoice this movement settles, once matched
    #[serde(default)]
    pub matched_invoice_id: Option<String>,
    #[serde(default)]
    pub match_confidence: Option<BigDecimal>,
    #[serde(default)]
    pub match_method: Option<MatchMethod>,
}

impl BankTransaction {
    /// Create an unmatched transaction
    pub fn new(
        id: String,
        statement_id: String,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
        transaction_type: TransactionType,
    ) -> Self {
        Self {
            id,
            statement_id,
            date,
            description,
            amount,
            transaction_type,
            counterparty_rfc: None,
            category: None,
            matched_invoice_id: None,
            match_confidence: None,
            match_method: None,
        }
    }

    /// Attach the counterparty RFC reported by the bank
    pub fn with_counterparty_rfc(mut self, rfc: impl Into<String>) -> Self {
        self.counterparty_rfc = Some(rfc.into());
        self
    }

    pub fn is_matched(&self) -> bool {
        self.matched_invoice_id.is_some()
    }
}

/// A CFDI invoice imported for the taxpayer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub user_id: String,
    /// Folio fiscal (CFDI UUID)
    pub uuid_fiscal: String,
    #[serde(rename = "type")]
    pub invoice_type: InvoiceType,
    /// Issuance date
    pub fecha: NaiveDate,
    pub rfc_emisor: String,
    #[serde(default)]
    pub nombre_emisor: Option<String>,
    pub rfc_receptor: String,
    #[serde(default)]
    pub nombre_receptor: Option<String>,
    pub subtotal: BigDecimal,
    /// IVA charged on the invoice; absent means zero
    #[serde(default)]
    pub iva: Option<BigDecimal>,
    pub total: BigDecimal,
    #[serde(default)]
    pub concepto: Option<String>,
    pub period: Period,
    #[serde(default = "zero")]
    pub retained_iva: BigDecimal,
    #[serde(default = "zero")]
    pub retained_isr: BigDecimal,
    #[serde(default)]
    pub status: InvoiceStatus,
    /// Transaction settling this invoice, once matched
    #[serde(default)]
    pub matched_transaction_id: Option<String>,
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

impl Invoice {
    /// Create a valid (`vigente`) invoice with no IVA, withholdings or names.
    /// The billing period is derived from `fecha`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        user_id: String,
        uuid_fiscal: String,
        invoice_type: InvoiceType,
        fecha: NaiveDate,
        rfc_emisor: String,
        rfc_receptor: String,
        subtotal: BigDecimal,
        total: BigDecimal,
    ) -> Self {
        Self {
            id,
            user_id,
            uuid_fiscal,
            invoice_type,
            fecha,
            rfc_emisor,
            nombre_emisor: None,
            rfc_receptor,
            nombre_receptor: None,
            subtotal,
            iva: None,
            total,
            concepto: None,
            period: Period::of_date(fecha),
            retained_iva: zero(),
            retained_isr: zero(),
            status: InvoiceStatus::Vigente,
            matched_transaction_id: None,
        }
    }

    /// IVA amount, treating an absent value as zero
    pub fn iva_amount(&self) -> BigDecimal {
        self.iva.clone().unwrap_or_else(zero)
    }

    pub fn is_vigente(&self) -> bool {
        self.status == InvoiceStatus::Vigente
    }

    pub fn is_matched(&self) -> bool {
        self.matched_transaction_id.is_some()
    }

    /// RFC of the party on the other side of a movement in `direction`:
    /// the receptor paid us, or we paid the emisor
    pub fn counterparty_rfc(&self, direction: TransactionType) -> &str {
        match direction {
            TransactionType::Ingreso => &self.rfc_receptor,
            TransactionType::Egreso => &self.rfc_emisor,
        }
    }

    /// Name of the counterparty, when recorded
    pub fn counterparty_name(&self, direction: TransactionType) -> Option<&str> {
        match direction {
            TransactionType::Ingreso => self.nombre_receptor.as_deref(),
            TransactionType::Egreso => self.nombre_emisor.as_deref(),
        }
    }
}

/// Errors that can occur in the reconciliation core
#[derive(Debug, thiserror::Error)]
pub enum ResicoError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid period (expected YYYY-MM): {0}")]
    InvalidPeriod(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Statement not found: {0}")]
    StatementNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),
    #[error("Already matched: {0}")]
    AlreadyMatched(String),
    #[error("Incompatible direction: transaction {transaction_id}, invoice {invoice_id}")]
    IncompatibleDirection {
        transaction_id: String,
        invoice_id: String,
    },
    #[error("A matching run is already in progress for user {user_id} in period {period}")]
    RunInProgress { user_id: String, period: Period },
}

/// Result type for reconciliation operations
pub type ResicoResult<T> = Result<T, ResicoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse_and_display() {
        let period: Period = "2024-01".parse().unwrap();
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 1);
        assert_eq!(period.to_string(), "2024-01");
    }

    #[test]
    fn test_period_rejects_malformed_input() {
        for raw in ["2024-13", "2024-00", "2024-1", "24-01", "2024/01", "abcd-ef", ""] {
            assert!(
                matches!(raw.parse::<Period>(), Err(ResicoError::InvalidPeriod(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_period_payment_deadline_rolls_over_year() {
        let december = Period::new(2024, 12).unwrap();
        assert_eq!(
            december.payment_deadline(),
            NaiveDate::from_ymd_opt(2025, 1, 17).unwrap()
        );

        let march = Period::new(2024, 3).unwrap();
        assert_eq!(
            march.payment_deadline(),
            NaiveDate::from_ymd_opt(2024, 4, 17).unwrap()
        );
    }

    #[test]
    fn test_period_bounds() {
        let february = Period::new(2024, 2).unwrap();
        assert_eq!(february.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(february.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(february.contains(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()));
        assert!(!february.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_period_serde_as_string() {
        let period = Period::new(2024, 7).unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2024-07\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
        assert!(serde_json::from_str::<Period>("\"2024-7\"").is_err());
    }

    #[test]
    fn test_expected_invoice_type() {
        assert_eq!(
            TransactionType::Ingreso.expected_invoice_type(),
            InvoiceType::Emitida
        );
        assert_eq!(
            TransactionType::Egreso.expected_invoice_type(),
            InvoiceType::Recibida
        );
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Ingreso).unwrap(),
            "\"ingreso\""
        );
        assert_eq!(
            serde_json::to_string(&InvoiceStatus::Cancelado).unwrap(),
            "\"cancelado\""
        );
        assert_eq!(serde_json::to_string(&MatchMethod::Auto).unwrap(), "\"auto\"");
    }
}
