//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::reconciliation::ReconciliationSummary;
use crate::tax::PeriodTaxReport;
use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    statements: HashMap<String, BankStatement>,
    transactions: HashMap<String, BankTransaction>,
    invoices: HashMap<String, Invoice>,
    attempts: Vec<MatchAttempt>,
    reconciliations: HashMap<(String, Period), ReconciliationSummary>,
    tax_reports: HashMap<(String, Period), PeriodTaxReport>,
    failing_match_writes: HashSet<String>,
    failing_audit_writes: bool,
}

/// In-memory storage implementation for testing and development
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ResicoResult<()> {
        *self.write()? = Tables::default();
        Ok(())
    }

    /// Make every `save_match` for this transaction fail, to exercise partial
    /// failure handling
    pub fn fail_match_writes_for(&self, transaction_id: &str) -> ResicoResult<()> {
        self.write()?
            .failing_match_writes
            .insert(transaction_id.to_string());
        Ok(())
    }

    /// Make every `record_match_attempt` fail
    pub fn fail_audit_writes(&self) -> ResicoResult<()> {
        self.write()?.failing_audit_writes = true;
        Ok(())
    }

    /// Audit records appended so far, oldest first
    pub fn match_attempts(&self) -> ResicoResult<Vec<MatchAttempt>> {
        Ok(self.read()?.attempts.clone())
    }

    pub fn reconciliation(
        &self,
        user_id: &str,
        period: Period,
    ) -> ResicoResult<Option<ReconciliationSummary>> {
        Ok(self
            .read()?
            .reconciliations
            .get(&(user_id.to_string(), period))
            .cloned())
    }

    pub fn tax_report(
        &self,
        user_id: &str,
        period: Period,
    ) -> ResicoResult<Option<PeriodTaxReport>> {
        Ok(self
            .read()?
            .tax_reports
            .get(&(user_id.to_string(), period))
            .cloned())
    }

    fn read(&self) -> ResicoResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| ResicoError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> ResicoResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| ResicoError::Storage("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl ResicoStorage for MemoryStorage {
    async fn save_statement(&mut self, statement: &BankStatement) -> ResicoResult<()> {
        self.write()?
            .statements
            .insert(statement.id.clone(), statement.clone());
        Ok(())
    }

    async fn save_transaction(&mut self, transaction: &BankTransaction) -> ResicoResult<()> {
        let mut tables = self.write()?;
        if !tables.statements.contains_key(&transaction.statement_id) {
            return Err(ResicoError::Storage(format!(
                "Statement '{}' does not exist",
                transaction.statement_id
            )));
        }
        tables
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn save_invoice(&mut self, invoice: &Invoice) -> ResicoResult<()> {
        let mut tables = self.write()?;
        let duplicate = tables.invoices.values().any(|other| {
            other.user_id == invoice.user_id
                && other.uuid_fiscal == invoice.uuid_fiscal
                && other.id != invoice.id
        });
        if duplicate {
            return Err(ResicoError::Storage(format!(
                "Invoice with fiscal UUID '{}' already exists",
                invoice.uuid_fiscal
            )));
        }
        tables.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> ResicoResult<Option<BankTransaction>> {
        Ok(self.read()?.transactions.get(transaction_id).cloned())
    }

    async fn get_invoice(&self, invoice_id: &str) -> ResicoResult<Option<Invoice>> {
        Ok(self.read()?.invoices.get(invoice_id).cloned())
    }

    async fn get_invoice_by_uuid(
        &self,
        user_id: &str,
        uuid_fiscal: &str,
    ) -> ResicoResult<Option<Invoice>> {
        Ok(self
            .read()?
            .invoices
            .values()
            .find(|inv| inv.user_id == user_id && inv.uuid_fiscal == uuid_fiscal)
            .cloned())
    }

    async fn get_statement(&self, statement_id: &str) -> ResicoResult<Option<BankStatement>> {
        Ok(self.read()?.statements.get(statement_id).cloned())
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        period: Period,
    ) -> ResicoResult<Vec<BankTransaction>> {
        let tables = self.read()?;
        let mut transactions: Vec<BankTransaction> = tables
            .transactions
            .values()
            .filter(|tx| {
                tables
                    .statements
                    .get(&tx.statement_id)
                    .is_some_and(|st| st.user_id == user_id && st.period == period)
            })
            .cloned()
            .collect();
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(transactions)
    }

    async fn list_invoices(&self, user_id: &str, period: Period) -> ResicoResult<Vec<Invoice>> {
        let tables = self.read()?;
        let mut invoices: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|inv| inv.user_id == user_id && inv.period == period)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.fecha.cmp(&b.fecha).then_with(|| a.id.cmp(&b.id)));
        Ok(invoices)
    }

    async fn save_match(
        &mut self,
        transaction_id: &str,
        invoice_id: &str,
        confidence: Option<BigDecimal>,
        method: MatchMethod,
    ) -> ResicoResult<()> {
        let mut tables = self.write()?;

        if tables.failing_match_writes.contains(transaction_id) {
            return Err(ResicoError::Storage(format!(
                "Simulated write failure for transaction '{}'",
                transaction_id
            )));
        }
        if !tables.invoices.contains_key(invoice_id) {
            return Err(ResicoError::InvoiceNotFound(invoice_id.to_string()));
        }

        let transaction = tables
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| ResicoError::TransactionNotFound(transaction_id.to_string()))?;
        transaction.matched_invoice_id = Some(invoice_id.to_string());
        transaction.match_confidence = confidence;
        transaction.match_method = Some(method);

        if let Some(invoice) = tables.invoices.get_mut(invoice_id) {
            invoice.matched_transaction_id = Some(transaction_id.to_string());
        }

        Ok(())
    }

    async fn record_match_attempt(&mut self, attempt: &MatchAttempt) -> ResicoResult<()> {
        let mut tables = self.write()?;
        if tables.failing_audit_writes {
            return Err(ResicoError::Storage("Simulated audit write failure".to_string()));
        }
        tables.attempts.push(attempt.clone());
        Ok(())
    }

    async fn save_reconciliation(
        &mut self,
        user_id: &str,
        summary: &ReconciliationSummary,
    ) -> ResicoResult<()> {
        self.write()?
            .reconciliations
            .insert((user_id.to_string(), summary.period), summary.clone());
        Ok(())
    }

    async fn save_tax_report(
        &mut self,
        user_id: &str,
        report: &PeriodTaxReport,
    ) -> ResicoResult<()> {
        self.write()?
            .tax_reports
            .insert((user_id.to_string(), report.period), report.clone());
        Ok(())
    }
}
