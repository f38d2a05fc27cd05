//! Ingestion of statements, bank transactions and invoices

use std::collections::HashSet;

use tracing::debug;

use crate::traits::*;
use crate::types::*;

/// Validates records once at ingestion and hands them to storage
pub struct RecordImporter<S: ResicoStorage> {
    pub(crate) storage: S,
    validator: Box<dyn RecordValidator>,
}

impl<S: ResicoStorage> RecordImporter<S> {
    /// Create a new importer with the default validator
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultRecordValidator),
        }
    }

    /// Create a new importer with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn RecordValidator>) -> Self {
        Self { storage, validator }
    }

    /// Register a bank statement
    pub async fn import_statement(
        &mut self,
        statement: BankStatement,
    ) -> ResicoResult<BankStatement> {
        if statement.id.trim().is_empty() || statement.user_id.trim().is_empty() {
            return Err(ResicoError::Validation(
                "Statement ID and user ID cannot be empty".to_string(),
            ));
        }

        if self.storage.get_statement(&statement.id).await?.is_some() {
            return Err(ResicoError::Validation(format!(
                "Statement with ID '{}' already exists",
                statement.id
            )));
        }

        self.storage.save_statement(&statement).await?;
        Ok(statement)
    }

    /// Import transactions extracted from one or more statements.
    ///
    /// The whole batch is checked before anything is saved; the first invalid
    /// record aborts the import.
    pub async fn import_transactions(
        &mut self,
        transactions: Vec<BankTransaction>,
    ) -> ResicoResult<usize> {
        let mut seen = HashSet::new();

        for transaction in &transactions {
            self.validator.validate_transaction(transaction)?;

            if !seen.insert(transaction.id.as_str()) {
                return Err(ResicoError::Validation(format!(
                    "Transaction ID '{}' appears more than once in the batch",
                    transaction.id
                )));
            }

            let statement = self
                .storage
                .get_statement(&transaction.statement_id)
                .await?
                .ok_or_else(|| {
                    ResicoError::Validation(format!(
                        "Statement '{}' does not exist",
                        transaction.statement_id
                    ))
                })?;

            if !statement.period.contains(transaction.date) {
                return Err(ResicoError::Validation(format!(
                    "Transaction {} dated {} falls outside statement period {}",
                    transaction.id, transaction.date, statement.period
                )));
            }

            if self.storage.get_transaction(&transaction.id).await?.is_some() {
                return Err(ResicoError::Validation(format!(
                    "Transaction with ID '{}' already exists",
                    transaction.id
                )));
            }
        }

        for transaction in &transactions {
            self.storage.save_transaction(transaction).await?;
        }

        debug!(count = transactions.len(), "imported bank transactions");
        Ok(transactions.len())
    }

    /// Import invoices with the same all-or-nothing checking as transactions.
    ///
    /// A fiscal UUID may appear once per user. Re-importing a known CFDI is
    /// rejected rather than overwriting it, so match links are never lost.
    pub async fn import_invoices(&mut self, invoices: Vec<Invoice>) -> ResicoResult<usize> {
        let mut seen_ids = HashSet::new();
        let mut seen_uuids = HashSet::new();

        for invoice in &invoices {
            self.validator.validate_invoice(invoice)?;

            if !seen_ids.insert(invoice.id.as_str()) {
                return Err(ResicoError::Validation(format!(
                    "Invoice ID '{}' appears more than once in the batch",
                    invoice.id
                )));
            }
            if !seen_uuids.insert((invoice.user_id.as_str(), invoice.uuid_fiscal.as_str())) {
                return Err(ResicoError::Validation(format!(
                    "Fiscal UUID '{}' appears more than once in the batch",
                    invoice.uuid_fiscal
                )));
            }

            if self.storage.get_invoice(&invoice.id).await?.is_some() {
                return Err(ResicoError::Validation(format!(
                    "Invoice with ID '{}' already exists",
                    invoice.id
                )));
            }
            if self
                .storage
                .get_invoice_by_uuid(&invoice.user_id, &invoice.uuid_fiscal)
                .await?
                .is_some()
            {
                return Err(ResicoError::Validation(format!(
                    "Invoice with fiscal UUID '{}' already exists",
                    invoice.uuid_fiscal
                )));
            }
        }

        for invoice in &invoices {
            self.storage.save_invoice(invoice).await?;
        }

        debug!(count = invoices.len(), "imported invoices");
        Ok(invoices.len())
    }
}
