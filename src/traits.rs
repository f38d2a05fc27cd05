//! Traits for storage abstraction and record validation

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matching::{MatchFactors, MatchResult};
use crate::reconciliation::ReconciliationSummary;
use crate::tax::PeriodTaxReport;
use crate::types::*;

/// Storage abstraction for the reconciliation core
///
/// The core never talks to a database directly; implement this trait over
/// PostgreSQL, SQLite, a hosted API, or use [`crate::utils::MemoryStorage`].
#[async_trait]
pub trait ResicoStorage: Send + Sync {
    /// Save a bank statement
    async fn save_statement(&mut self, statement: &BankStatement) -> ResicoResult<()>;

    /// Save (insert or replace) a bank transaction
    async fn save_transaction(&mut self, transaction: &BankTransaction) -> ResicoResult<()>;

    /// Save (insert or replace) an invoice
    async fn save_invoice(&mut self, invoice: &Invoice) -> ResicoResult<()>;

    /// Get a bank transaction by ID
    async fn get_transaction(&self, transaction_id: &str) -> ResicoResult<Option<BankTransaction>>;

    /// Get an invoice by ID
    async fn get_invoice(&self, invoice_id: &str) -> ResicoResult<Option<Invoice>>;

    /// Get a user's invoice by its fiscal UUID
    async fn get_invoice_by_uuid(
        &self,
        user_id: &str,
        uuid_fiscal: &str,
    ) -> ResicoResult<Option<Invoice>>;

    /// Get the statement a transaction belongs to
    async fn get_statement(&self, statement_id: &str) -> ResicoResult<Option<BankStatement>>;

    /// Transactions from the user's statements for a period, in a stable order
    async fn list_transactions(
        &self,
        user_id: &str,
        period: Period,
    ) -> ResicoResult<Vec<BankTransaction>>;

    /// The user's invoices billed in a period, in a stable order
    async fn list_invoices(&self, user_id: &str, period: Period) -> ResicoResult<Vec<Invoice>>;

    /// Link a transaction and an invoice to each other
    async fn save_match(
        &mut self,
        transaction_id: &str,
        invoice_id: &str,
        confidence: Option<BigDecimal>,
        method: MatchMethod,
    ) -> ResicoResult<()>;

    /// Append an audit record for a match decision
    async fn record_match_attempt(&mut self, attempt: &MatchAttempt) -> ResicoResult<()>;

    /// Insert or replace the reconciliation for (user, period)
    async fn save_reconciliation(
        &mut self,
        user_id: &str,
        summary: &ReconciliationSummary,
    ) -> ResicoResult<()>;

    /// Insert or replace the tax report for (user, period)
    async fn save_tax_report(
        &mut self,
        user_id: &str,
        report: &PeriodTaxReport,
    ) -> ResicoResult<()>;
}

/// Trait for implementing ingestion-time record validation
pub trait RecordValidator: Send + Sync {
    /// Validate a bank transaction before saving
    fn validate_transaction(&self, transaction: &BankTransaction) -> ResicoResult<()>;

    /// Validate an invoice before saving
    fn validate_invoice(&self, invoice: &Invoice) -> ResicoResult<()>;
}

/// Default validator: identifiers present, amounts non-negative
pub struct DefaultRecordValidator;

impl RecordValidator for DefaultRecordValidator {
    fn validate_transaction(&self, transaction: &BankTransaction) -> ResicoResult<()> {
        if transaction.id.trim().is_empty() {
            return Err(ResicoError::Validation(
                "Transaction ID cannot be empty".to_string(),
            ));
        }

        if transaction.amount < BigDecimal::from(0) {
            return Err(ResicoError::Validation(format!(
                "Transaction {} has a negative amount; record the magnitude and the direction",
                transaction.id
            )));
        }

        Ok(())
    }

    fn validate_invoice(&self, invoice: &Invoice) -> ResicoResult<()> {
        if invoice.id.trim().is_empty() {
            return Err(ResicoError::Validation("Invoice ID cannot be empty".to_string()));
        }

        if invoice.uuid_fiscal.trim().is_empty() {
            return Err(ResicoError::Validation(format!(
                "Invoice {} has no fiscal UUID",
                invoice.id
            )));
        }

        let zero = BigDecimal::from(0);
        let amounts = [
            ("subtotal", &invoice.subtotal),
            ("total", &invoice.total),
            ("retained_iva", &invoice.retained_iva),
            ("retained_isr", &invoice.retained_isr),
        ];
        for (field, amount) in amounts {
            if *amount < zero {
                return Err(ResicoError::Validation(format!(
                    "Invoice {} has a negative {}",
                    invoice.id, field
                )));
            }
        }

        if invoice.iva.as_ref().is_some_and(|iva| *iva < zero) {
            return Err(ResicoError::Validation(format!(
                "Invoice {} has a negative iva",
                invoice.id
            )));
        }

        Ok(())
    }
}

/// Audit trail entry for one match decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAttempt {
    pub id: Uuid,
    pub transaction_id: String,
    pub invoice_id: String,
    pub confidence: Option<BigDecimal>,
    /// Full factor breakdown, when the pair was scored
    pub factors: Option<MatchFactors>,
    /// Whether this pairing was the one applied
    pub was_selected: bool,
    pub method: MatchMethod,
    pub created_at: NaiveDateTime,
}

impl MatchAttempt {
    /// Audit entry for a match the engine selected
    pub fn selected(result: &MatchResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: result.transaction_id.clone(),
            invoice_id: result.invoice_id.clone(),
            confidence: Some(result.confidence.clone()),
            factors: Some(result.factors.clone()),
            was_selected: true,
            method: MatchMethod::Auto,
            created_at: Utc::now().naive_utc(),
        }
    }

    /// Audit entry for a pairing confirmed by the user
    pub fn manual(transaction_id: &str, invoice_id: &str, scored: Option<&MatchResult>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: transaction_id.to_string(),
            invoice_id: invoice_id.to_string(),
            confidence: scored.map(|result| result.confidence.clone()),
            factors: scored.map(|result| result.factors.clone()),
            was_selected: true,
            method: MatchMethod::Manual,
            created_at: Utc::now().naive_utc(),
        }
    }
}
