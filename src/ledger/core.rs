//! Main ledger orchestrator that coordinates imports, matching runs,
//! reconciliation and monthly tax reports

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ledger::{MatchRunRegistry, RecordImporter};
use crate::matching::*;
use crate::reconciliation::{ReconciliationEngine, ReconciliationSummary};
use crate::tax::{
    check_resico_limit, IncomeBasis, IsrTable, PeriodTaxReport, ResicoLimitStatus,
    TaxCalculationInput,
};
use crate::traits::*;
use crate::types::*;

/// A committed match whose write did not go through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFailure {
    pub transaction_id: String,
    pub invoice_id: String,
    pub reason: String,
}

/// Outcome of one automatic matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRunReport {
    pub period: Period,
    /// Set when the run covered a single statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<String>,
    /// Matches persisted, in commit order
    pub applied: Vec<MatchResult>,
    /// Matches selected but not persisted
    pub failed: Vec<MatchFailure>,
    pub total_transactions: usize,
    pub total_invoices: usize,
}

/// Main reconciliation system for one storage backend
pub struct ResicoLedger<S: ResicoStorage> {
    importer: RecordImporter<S>,
    storage: S,
    matching_config: MatchingConfig,
    isr_table: IsrTable,
    engine: ReconciliationEngine,
    runs: MatchRunRegistry,
}

impl<S: ResicoStorage + Clone> ResicoLedger<S> {
    /// Create a new ledger with default matching parameters and the 2024 ISR table
    pub fn new(storage: S) -> Self {
        Self {
            importer: RecordImporter::new(storage.clone()),
            storage,
            matching_config: MatchingConfig::default(),
            isr_table: IsrTable::default(),
            engine: ReconciliationEngine::new(),
            runs: MatchRunRegistry::new(),
        }
    }

    /// Create a new ledger with custom matching parameters and ISR table
    pub fn with_config(
        storage: S,
        matching_config: MatchingConfig,
        isr_table: IsrTable,
    ) -> ResicoResult<Self> {
        matching_config.validate()?;
        isr_table
            .validate()
            .map_err(|e| ResicoError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            matching_config,
            isr_table,
            ..Self::new(storage)
        })
    }

    /// Create a new ledger with a custom ingestion validator
    pub fn with_validator(storage: S, validator: Box<dyn RecordValidator>) -> Self {
        Self {
            importer: RecordImporter::with_validator(storage.clone(), validator),
            ..Self::new(storage)
        }
    }

    /// Share a run registry with other ledgers over the same data
    pub fn with_run_registry(mut self, runs: MatchRunRegistry) -> Self {
        self.runs = runs;
        self
    }

    /// Override the bank-vs-invoice tolerance used by reconciliation
    pub fn with_reconciliation_tolerance(mut self, tolerance: BigDecimal) -> Self {
        self.engine = ReconciliationEngine::with_tolerance(tolerance);
        self
    }

    pub fn matching_config(&self) -> &MatchingConfig {
        &self.matching_config
    }

    pub fn isr_table(&self) -> &IsrTable {
        &self.isr_table
    }

    pub fn run_registry(&self) -> &MatchRunRegistry {
        &self.runs
    }

    // Import operations
    /// Register a bank statement
    pub async fn import_statement(
        &mut self,
        statement: BankStatement,
    ) -> ResicoResult<BankStatement> {
        self.importer.import_statement(statement).await
    }

    /// Import bank transactions; returns how many were saved
    pub async fn import_transactions(
        &mut self,
        transactions: Vec<BankTransaction>,
    ) -> ResicoResult<usize> {
        self.importer.import_transactions(transactions).await
    }

    /// Import invoices; returns how many were saved
    pub async fn import_invoices(&mut self, invoices: Vec<Invoice>) -> ResicoResult<usize> {
        self.importer.import_invoices(invoices).await
    }

    // Matching operations
    /// Match the period's open transactions against its open invoices and
    /// persist every selected pair.
    ///
    /// A pair whose write fails is reported in [`MatchRunReport::failed`] and
    /// the run moves on to the next one.
    pub async fn run_auto_matching(
        &mut self,
        user_id: &str,
        period: Period,
    ) -> ResicoResult<MatchRunReport> {
        let _permit = self.runs.try_acquire(user_id, period)?;

        let transactions = self.storage.list_transactions(user_id, period).await?;
        let invoices = self.storage.list_invoices(user_id, period).await?;

        let report = self
            .apply_best_matches(user_id, period, None, &transactions, &invoices)
            .await;
        Ok(report)
    }

    /// Match one statement's open transactions against the open invoices of
    /// the statement's period.
    ///
    /// Holds the same (user, period) permit as [`Self::run_auto_matching`], so
    /// it cannot overlap a period-wide run. Fails with
    /// [`ResicoError::StatementNotFound`] when the statement is missing or
    /// belongs to another user.
    pub async fn run_auto_matching_for_statement(
        &mut self,
        user_id: &str,
        statement_id: &str,
    ) -> ResicoResult<MatchRunReport> {
        let statement = self
            .storage
            .get_statement(statement_id)
            .await?
            .filter(|statement| statement.user_id == user_id)
            .ok_or_else(|| ResicoError::StatementNotFound(statement_id.to_string()))?;
        let period = statement.period;

        let _permit = self.runs.try_acquire(user_id, period)?;

        let transactions: Vec<BankTransaction> = self
            .storage
            .list_transactions(user_id, period)
            .await?
            .into_iter()
            .filter(|tx| tx.statement_id == statement.id)
            .collect();
        let invoices = self.storage.list_invoices(user_id, period).await?;

        let report = self
            .apply_best_matches(user_id, period, Some(statement.id), &transactions, &invoices)
            .await;
        Ok(report)
    }

    async fn apply_best_matches(
        &mut self,
        user_id: &str,
        period: Period,
        statement_id: Option<String>,
        transactions: &[BankTransaction],
        invoices: &[Invoice],
    ) -> MatchRunReport {
        let selected = find_best_matches(transactions, invoices, &self.matching_config);
        debug!(user_id, %period, selected = selected.len(), "matching run selected pairs");

        let mut report = MatchRunReport {
            period,
            statement_id,
            applied: Vec::new(),
            failed: Vec::new(),
            total_transactions: transactions.len(),
            total_invoices: invoices.len(),
        };

        for result in selected {
            let saved = self
                .storage
                .save_match(
                    &result.transaction_id,
                    &result.invoice_id,
                    Some(result.confidence.clone()),
                    MatchMethod::Auto,
                )
                .await;

            if let Err(err) = saved {
                warn!(
                    transaction_id = %result.transaction_id,
                    invoice_id = %result.invoice_id,
                    error = %err,
                    "skipping match that could not be saved"
                );
                report.failed.push(MatchFailure {
                    transaction_id: result.transaction_id,
                    invoice_id: result.invoice_id,
                    reason: err.to_string(),
                });
                continue;
            }

            if let Err(err) = self
                .storage
                .record_match_attempt(&MatchAttempt::selected(&result))
                .await
            {
                warn!(
                    transaction_id = %result.transaction_id,
                    error = %err,
                    "match saved but audit record was not"
                );
            }

            report.applied.push(result);
        }

        info!(
            user_id,
            %period,
            statement_id = ?report.statement_id,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "matching run finished"
        );

        report
    }

    /// Best open invoices of the period for one open transaction, for manual
    /// review
    pub async fn suggest_matches(
        &self,
        transaction_id: &str,
        period: Period,
    ) -> ResicoResult<Vec<MatchResult>> {
        let transaction = self.get_transaction_required(transaction_id).await?;
        if transaction.is_matched() {
            return Err(ResicoError::AlreadyMatched(format!(
                "transaction {}",
                transaction_id
            )));
        }
        let statement = self
            .storage
            .get_statement(&transaction.statement_id)
            .await?
            .ok_or_else(|| {
                ResicoError::Storage(format!(
                    "Statement '{}' of transaction '{}' is missing",
                    transaction.statement_id, transaction.id
                ))
            })?;

        let open_invoices: Vec<Invoice> = self
            .storage
            .list_invoices(&statement.user_id, period)
            .await?
            .into_iter()
            .filter(|inv| !inv.is_matched())
            .collect();

        Ok(get_suggested_matches(
            &transaction,
            &open_invoices,
            &self.matching_config,
        ))
    }

    /// Link a transaction and an invoice chosen by the user.
    ///
    /// Both records must belong to `user_id`, be unmatched, and point in
    /// compatible directions. The pair does not have to clear the scorer; its
    /// confidence is stored when it does.
    pub async fn confirm_manual_match(
        &mut self,
        user_id: &str,
        transaction_id: &str,
        invoice_id: &str,
    ) -> ResicoResult<MatchAttempt> {
        let transaction = self.get_transaction_required(transaction_id).await?;
        let owner = self
            .storage
            .get_statement(&transaction.statement_id)
            .await?
            .map(|statement| statement.user_id);
        if owner.as_deref() != Some(user_id) {
            return Err(ResicoError::TransactionNotFound(transaction_id.to_string()));
        }

        let invoice = self
            .storage
            .get_invoice(invoice_id)
            .await?
            .filter(|inv| inv.user_id == user_id)
            .ok_or_else(|| ResicoError::InvoiceNotFound(invoice_id.to_string()))?;

        if transaction.is_matched() {
            return Err(ResicoError::AlreadyMatched(format!(
                "transaction {}",
                transaction_id
            )));
        }
        if invoice.is_matched() {
            return Err(ResicoError::AlreadyMatched(format!("invoice {}", invoice_id)));
        }
        if transaction.transaction_type.expected_invoice_type() != invoice.invoice_type {
            return Err(ResicoError::IncompatibleDirection {
                transaction_id: transaction_id.to_string(),
                invoice_id: invoice_id.to_string(),
            });
        }
        if !invoice.is_vigente() {
            return Err(ResicoError::Validation(format!(
                "Invoice {} is canceled",
                invoice_id
            )));
        }

        let scored = calculate_match(&transaction, &invoice, &self.matching_config);
        self.storage
            .save_match(
                transaction_id,
                invoice_id,
                scored.as_ref().map(|result| result.confidence.clone()),
                MatchMethod::Manual,
            )
            .await?;

        let attempt = MatchAttempt::manual(transaction_id, invoice_id, scored.as_ref());
        if let Err(err) = self.storage.record_match_attempt(&attempt).await {
            warn!(
                transaction_id,
                invoice_id,
                error = %err,
                "manual match saved but audit record was not"
            );
        }

        info!(user_id, transaction_id, invoice_id, "manual match confirmed");
        Ok(attempt)
    }

    // Reporting operations
    /// Reconcile the period and store the summary, replacing any previous one
    pub async fn calculate_reconciliation(
        &mut self,
        user_id: &str,
        period: Period,
    ) -> ResicoResult<ReconciliationSummary> {
        let transactions = self.storage.list_transactions(user_id, period).await?;
        let invoices = self.storage.list_invoices(user_id, period).await?;

        let summary = self.engine.reconcile(period, &transactions, &invoices);
        self.storage.save_reconciliation(user_id, &summary).await?;

        info!(user_id, %period, status = ?summary.status, "reconciliation calculated");
        Ok(summary)
    }

    /// Compute the monthly ISR/IVA filing and store it, replacing any previous one
    pub async fn calculate_period_taxes(
        &mut self,
        user_id: &str,
        period: Period,
        basis: IncomeBasis,
    ) -> ResicoResult<PeriodTaxReport> {
        let transactions = self.storage.list_transactions(user_id, period).await?;
        let invoices = self.storage.list_invoices(user_id, period).await?;

        let report =
            PeriodTaxReport::build(&self.isr_table, period, &invoices, &transactions, basis);
        self.storage.save_tax_report(user_id, &report).await?;

        info!(
            user_id,
            %period,
            total_por_pagar = %report.result.total_por_pagar,
            "period taxes calculated"
        );
        Ok(report)
    }

    /// Invoiced income of the calendar year against the RESICO annual ceiling
    pub async fn annual_limit_status(
        &self,
        user_id: &str,
        year: i32,
    ) -> ResicoResult<ResicoLimitStatus> {
        let mut income = BigDecimal::from(0);
        let mut period = Period::new(year, 1)?;

        while period.year() == year {
            let invoices = self.storage.list_invoices(user_id, period).await?;
            income += TaxCalculationInput::from_records(&invoices, &[]).ingresos_facturados;
            period = period.next();
        }

        let status = check_resico_limit(&income);
        if status.exceeded {
            warn!(user_id, year, income = %income, "annual RESICO limit exceeded");
        }
        Ok(status)
    }

    async fn get_transaction_required(
        &self,
        transaction_id: &str,
    ) -> ResicoResult<BankTransaction> {
        self.storage
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| ResicoError::TransactionNotFound(transaction_id.to_string()))
    }
}
