//! Selection of matches across a whole batch of transactions and invoices

use std::collections::HashSet;

use tracing::debug;

use crate::matching::{calculate_match, MatchResult, MatchingConfig};
use crate::types::{BankTransaction, Invoice};

/// Number of candidates returned for manual review
pub const MAX_SUGGESTIONS: usize = 5;

/// Assign invoices to transactions 1:1 using a global greedy walk.
///
/// Every unsettled pair is scored, the pool is stable-sorted by confidence
/// (ties keep transaction-major, invoice-minor order) and each pair is
/// committed unless one of its sides was already taken. This is not an
/// optimal assignment. Transactions or invoices already linked to a match are
/// left out, so re-running over settled data returns nothing.
pub fn find_best_matches(
    transactions: &[BankTransaction],
    invoices: &[Invoice],
    config: &MatchingConfig,
) -> Vec<MatchResult> {
    let open_invoices: Vec<&Invoice> = invoices.iter().filter(|inv| !inv.is_matched()).collect();

    let mut pool: Vec<MatchResult> = transactions
        .iter()
        .filter(|tx| !tx.is_matched())
        .flat_map(|tx| {
            open_invoices
                .iter()
                .filter_map(move |inv| calculate_match(tx, inv, config))
        })
        .collect();

    debug!(
        transactions = transactions.len(),
        invoices = open_invoices.len(),
        candidates = pool.len(),
        "scored candidate pool"
    );

    pool.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    let mut taken_transactions = HashSet::new();
    let mut taken_invoices = HashSet::new();
    let mut committed = Vec::new();

    for candidate in pool {
        if taken_transactions.contains(&candidate.transaction_id)
            || taken_invoices.contains(&candidate.invoice_id)
        {
            continue;
        }

        taken_transactions.insert(candidate.transaction_id.clone());
        taken_invoices.insert(candidate.invoice_id.clone());
        committed.push(candidate);
    }

    committed
}

/// Best candidate invoices for one transaction, highest confidence first.
/// Nothing is excluded or committed; meant for manual review.
pub fn get_suggested_matches(
    transaction: &BankTransaction,
    invoices: &[Invoice],
    config: &MatchingConfig,
) -> Vec<MatchResult> {
    let mut suggestions: Vec<MatchResult> = invoices
        .iter()
        .filter_map(|inv| calculate_match(transaction, inv, config))
        .collect();

    suggestions.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}
