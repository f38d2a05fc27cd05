//! Period-level tax calculation from reconciled totals

use std::collections::HashSet;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::tax::isr::{calculate_isr_with_table, IsrCalculation, IsrTable};
use crate::tax::iva::{calculate_iva, IvaCalculation};
use crate::types::{BankTransaction, Invoice, InvoiceType, Period};

/// Which income figure the ISR base is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IncomeBasis {
    /// Subtotal of valid issued invoices in the period
    #[default]
    Facturado,
    /// Subtotal of issued invoices already settled by a bank deposit
    Cobrado,
}

/// Aggregated period totals feeding the tax calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculationInput {
    pub ingresos_facturados: BigDecimal,
    pub ingresos_cobrados: BigDecimal,
    pub gastos_facturados: BigDecimal,
    pub gastos_pagados: BigDecimal,
    pub iva_trasladado: BigDecimal,
    pub iva_acreditable: BigDecimal,
    pub iva_retenido: BigDecimal,
    pub isr_retenido: BigDecimal,
}

impl Default for TaxCalculationInput {
    fn default() -> Self {
        Self {
            ingresos_facturados: BigDecimal::from(0),
            ingresos_cobrados: BigDecimal::from(0),
            gastos_facturados: BigDecimal::from(0),
            gastos_pagados: BigDecimal::from(0),
            iva_trasladado: BigDecimal::from(0),
            iva_acreditable: BigDecimal::from(0),
            iva_retenido: BigDecimal::from(0),
            isr_retenido: BigDecimal::from(0),
        }
    }
}

impl TaxCalculationInput {
    /// Sum a period's records. Canceled invoices are ignored; collected and
    /// paid amounts count only invoices some transaction has been matched to.
    pub fn from_records(invoices: &[Invoice], transactions: &[BankTransaction]) -> Self {
        let settled: HashSet<&str> = transactions
            .iter()
            .filter_map(|tx| tx.matched_invoice_id.as_deref())
            .collect();

        let mut input = Self::default();

        for invoice in invoices.iter().filter(|inv| inv.is_vigente()) {
            let is_settled = settled.contains(invoice.id.as_str());

            match invoice.invoice_type {
                InvoiceType::Emitida => {
                    input.ingresos_facturados += &invoice.subtotal;
                    input.iva_trasladado += invoice.iva_amount();
                    input.iva_retenido += &invoice.retained_iva;
                    input.isr_retenido += &invoice.retained_isr;
                    if is_settled {
                        input.ingresos_cobrados += &invoice.subtotal;
                    }
                }
                InvoiceType::Recibida => {
                    input.gastos_facturados += &invoice.subtotal;
                    input.iva_acreditable += invoice.iva_amount();
                    if is_settled {
                        input.gastos_pagados += &invoice.subtotal;
                    }
                }
            }
        }

        input
    }

    fn isr_base(&self, basis: IncomeBasis) -> &BigDecimal {
        match basis {
            IncomeBasis::Facturado => &self.ingresos_facturados,
            IncomeBasis::Cobrado => &self.ingresos_cobrados,
        }
    }
}

/// ISR and IVA position for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculationResult {
    pub isr: IsrCalculation,
    pub iva: IvaCalculation,
    /// ISR plus IVA payable
    pub total_por_pagar: BigDecimal,
    /// IVA in the taxpayer's favor
    pub total_a_favor: BigDecimal,
}

/// Compute ISR and IVA for a period's totals
pub fn calculate_taxes(
    table: &IsrTable,
    input: &TaxCalculationInput,
    basis: IncomeBasis,
) -> TaxCalculationResult {
    let isr = calculate_isr_with_table(table, input.isr_base(basis), &input.isr_retenido);
    let iva = calculate_iva(
        &input.iva_trasladado,
        &input.iva_acreditable,
        &input.iva_retenido,
    );

    TaxCalculationResult {
        total_por_pagar: &isr.isr_por_pagar + &iva.por_pagar,
        total_a_favor: iva.a_favor.clone(),
        isr,
        iva,
    }
}

/// Monthly filing for one period, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTaxReport {
    pub period: Period,
    /// Day 17 of the following month
    pub fecha_limite_pago: NaiveDate,
    pub basis: IncomeBasis,
    pub input: TaxCalculationInput,
    pub result: TaxCalculationResult,
}

impl PeriodTaxReport {
    pub fn build(
        table: &IsrTable,
        period: Period,
        invoices: &[Invoice],
        transactions: &[BankTransaction],
        basis: IncomeBasis,
    ) -> Self {
        let input = TaxCalculationInput::from_records(invoices, transactions);
        let result = calculate_taxes(table, &input, basis);

        Self {
            period,
            fecha_limite_pago: period.payment_deadline(),
            basis,
            input,
            result,
        }
    }
}
