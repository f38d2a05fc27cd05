//! Period reconciliation of bank movements against invoices

use std::collections::HashSet;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{BankTransaction, Invoice, InvoiceType, Period, TransactionType};
use crate::utils::decimal::decimal;

/// Largest bank-vs-invoice difference (MXN) still treated as reconciled.
/// Absorbs centavo rounding drift.
pub fn reconciliation_tolerance() -> BigDecimal {
    decimal(100, 2)
}

/// Outcome of a period reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Nothing to reconcile yet
    Pendiente,
    /// Totals agree and every record is matched
    Completo,
    /// Data present but totals or matches are off
    ConDiferencias,
}

/// Bank total next to the invoice total for one direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowComparison {
    pub banco: BigDecimal,
    pub facturas: BigDecimal,
    /// `banco - facturas`
    pub diferencia: BigDecimal,
}

impl FlowComparison {
    fn new(banco: BigDecimal, facturas: BigDecimal) -> Self {
        let diferencia = &banco - &facturas;
        Self {
            banco,
            facturas,
            diferencia,
        }
    }

    fn within(&self, tolerance: &BigDecimal) -> bool {
        self.diferencia.abs() <= *tolerance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub period: Period,
    pub status: ReconciliationStatus,
    pub ingresos: FlowComparison,
    pub egresos: FlowComparison,
    pub total_transactions: usize,
    pub matched_transactions: usize,
    pub unmatched_transactions: usize,
    /// Valid (`vigente`) invoices in the period
    pub total_invoices: usize,
    pub unmatched_invoices: usize,
}

/// Reconciliation engine comparing a period's bank statement against its invoices
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    tolerance: BigDecimal,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self {
            tolerance: reconciliation_tolerance(),
        }
    }

    pub fn with_tolerance(tolerance: BigDecimal) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> &BigDecimal {
        &self.tolerance
    }

    /// Aggregate totals and counts for a period and classify it.
    /// Callers pass the records already scoped to the period.
    pub fn reconcile(
        &self,
        period: Period,
        transactions: &[BankTransaction],
        invoices: &[Invoice],
    ) -> ReconciliationSummary {
        let bank_total = |direction: TransactionType| -> BigDecimal {
            transactions
                .iter()
                .filter(|tx| tx.transaction_type == direction)
                .map(|tx| &tx.amount)
                .sum()
        };

        let valid_invoices: Vec<&Invoice> =
            invoices.iter().filter(|inv| inv.is_vigente()).collect();
        let invoice_total = |kind: InvoiceType| -> BigDecimal {
            valid_invoices
                .iter()
                .filter(|inv| inv.invoice_type == kind)
                .map(|inv| &inv.total)
                .sum()
        };

        let ingresos = FlowComparison::new(
            bank_total(TransactionType::Ingreso),
            invoice_total(InvoiceType::Emitida),
        );
        let egresos = FlowComparison::new(
            bank_total(TransactionType::Egreso),
            invoice_total(InvoiceType::Recibida),
        );

        let matched_invoice_ids: HashSet<&str> = transactions
            .iter()
            .filter_map(|tx| tx.matched_invoice_id.as_deref())
            .collect();

        let matched_transactions = transactions.iter().filter(|tx| tx.is_matched()).count();
        let unmatched_transactions = transactions.len() - matched_transactions;
        let unmatched_invoices = valid_invoices
            .iter()
            .filter(|inv| !matched_invoice_ids.contains(inv.id.as_str()))
            .count();

        let status = if transactions.is_empty() && valid_invoices.is_empty() {
            ReconciliationStatus::Pendiente
        } else if !transactions.is_empty()
            && !valid_invoices.is_empty()
            && ingresos.within(&self.tolerance)
            && egresos.within(&self.tolerance)
            && unmatched_transactions == 0
            && unmatched_invoices == 0
        {
            ReconciliationStatus::Completo
        } else {
            ReconciliationStatus::ConDiferencias
        };

        ReconciliationSummary {
            period,
            status,
            ingresos,
            egresos,
            total_transactions: transactions.len(),
            matched_transactions,
            unmatched_transactions,
            total_invoices: valid_invoices.len(),
            unmatched_invoices,
        }
    }
}
