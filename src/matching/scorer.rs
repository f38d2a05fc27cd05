//! Pairwise scoring of a bank transaction against an invoice

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::matching::MatchingConfig;
use crate::types::{BankTransaction, Invoice};
use crate::utils::decimal::{decimal, round_cents};

/// Component scores behind a match, kept for auditability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFactors {
    /// Amount closeness, weight 0.40
    pub amount_match: BigDecimal,
    /// Date closeness, weight 0.30
    pub date_proximity: BigDecimal,
    /// Counterparty RFC agreement, weight 0.20
    pub rfc_match: BigDecimal,
    /// Concepto / counterparty name found in the bank description, weight 0.10
    pub description_match: BigDecimal,
}

impl MatchFactors {
    /// Weighted sum of the four factors, unrounded
    pub fn weighted_confidence(&self) -> BigDecimal {
        &self.amount_match * decimal(40, 2)
            + &self.date_proximity * decimal(30, 2)
            + &self.rfc_match * decimal(20, 2)
            + &self.description_match * decimal(10, 2)
    }
}

/// A scored (transaction, invoice) pair that cleared every hard filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub transaction_id: String,
    pub invoice_id: String,
    /// Weighted confidence in [0, 1], rounded to 2 decimals
    pub confidence: BigDecimal,
    pub factors: MatchFactors,
}

/// Score one transaction against one invoice.
///
/// Returns `None` when the pair is disqualified: canceled invoice, incompatible
/// direction, zero invoice total, amount off by more than 5%, or a confidence
/// below `config.min_confidence`. Disqualification is the common case and is
/// not an error.
pub fn calculate_match(
    transaction: &BankTransaction,
    invoice: &Invoice,
    config: &MatchingConfig,
) -> Option<MatchResult> {
    if !invoice.is_vigente() {
        return None;
    }

    if invoice.invoice_type != transaction.transaction_type.expected_invoice_type() {
        return None;
    }

    let factors = MatchFactors {
        amount_match: amount_score(&transaction.amount, &invoice.total, config)?,
        date_proximity: date_score(transaction.date, invoice.fecha, config),
        rfc_match: rfc_score(transaction, invoice),
        description_match: description_score(transaction, invoice),
    };

    let confidence = factors.weighted_confidence();
    if confidence < config.min_confidence {
        return None;
    }

    Some(MatchResult {
        transaction_id: transaction.id.clone(),
        invoice_id: invoice.id.clone(),
        confidence: round_cents(&confidence),
        factors,
    })
}

/// Tiered amount score; `None` past 5% relative difference or on a zero total
fn amount_score(
    transaction_amount: &BigDecimal,
    invoice_total: &BigDecimal,
    config: &MatchingConfig,
) -> Option<BigDecimal> {
    let invoice_total = invoice_total.abs();
    if invoice_total == BigDecimal::from(0) {
        return None;
    }

    let diff = (transaction_amount.abs() - &invoice_total).abs() / &invoice_total;

    if diff <= config.amount_tolerance {
        Some(BigDecimal::from(1))
    } else if diff <= decimal(1, 2) {
        Some(decimal(85, 2))
    } else if diff <= decimal(3, 2) {
        Some(decimal(60, 2))
    } else if diff <= decimal(5, 2) {
        Some(decimal(40, 2))
    } else {
        None
    }
}

/// Tiered date score on absolute calendar-day distance; never zero
fn date_score(
    transaction_date: NaiveDate,
    invoice_date: NaiveDate,
    config: &MatchingConfig,
) -> BigDecimal {
    let days = (transaction_date - invoice_date).num_days().abs();

    if days <= 1 {
        BigDecimal::from(1)
    } else if days <= 3 {
        decimal(85, 2)
    } else if days <= 5 {
        decimal(70, 2)
    } else if days <= config.max_date_diff {
        decimal(50, 2)
    } else if days <= 15 {
        decimal(30, 2)
    } else if days <= 30 {
        decimal(15, 2)
    } else {
        decimal(5, 2)
    }
}

/// A missing counterparty RFC is neutral; a present but different one is a
/// strong hint against the pair without disqualifying it.
fn rfc_score(transaction: &BankTransaction, invoice: &Invoice) -> BigDecimal {
    let expected = invoice.counterparty_rfc(transaction.transaction_type);

    match transaction
        .counterparty_rfc
        .as_deref()
        .filter(|rfc| !rfc.is_empty())
    {
        Some(rfc) if rfc.to_uppercase() == expected.to_uppercase() => BigDecimal::from(1),
        Some(_) => decimal(10, 2),
        None => decimal(50, 2),
    }
}

fn description_score(transaction: &BankTransaction, invoice: &Invoice) -> BigDecimal {
    let description = transaction.description.to_lowercase();
    let mut score = decimal(30, 2);

    let concepto = invoice
        .concepto
        .as_deref()
        .map(str::to_lowercase)
        .filter(|concepto| concepto.chars().count() > 5);

    if let Some(concepto) = concepto {
        let keywords: Vec<&str> = concepto
            .split(' ')
            .filter(|word| word.chars().count() > 3)
            .collect();
        let matched = keywords
            .iter()
            .filter(|keyword| description.contains(*keyword))
            .count();

        if matched > 0 {
            let ratio = BigDecimal::from(matched as u64) / BigDecimal::from(keywords.len() as u64);
            score = (decimal(5, 1) + ratio * decimal(5, 1)).min(BigDecimal::from(1));
        }
    }

    let name = invoice
        .counterparty_name(transaction.transaction_type)
        .map(str::to_lowercase)
        .filter(|name| name.chars().count() > 3);

    if let Some(name) = name {
        let mentioned = name
            .split(' ')
            .filter(|part| part.chars().count() > 2)
            .any(|part| description.contains(part));

        if mentioned {
            score = score.max(decimal(80, 2));
        }
    }

    score
}
