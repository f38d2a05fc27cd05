//! Integration tests for resico-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use resico_core::{
    utils::{MemoryStorage, StrictRecordValidator},
    BankStatement, BankTransaction, IncomeBasis, Invoice, InvoiceType, MatchMethod,
    MatchRunRegistry, ReconciliationStatus, ResicoError, ResicoLedger, ResicoStorage, Period,
    TransactionType,
};
use std::str::FromStr;

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn march() -> Period {
    Period::new(2024, 3).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn movement(
    id: &str,
    d: u32,
    description: &str,
    amount: &str,
    kind: TransactionType,
) -> BankTransaction {
    BankTransaction::new(
        id.to_string(),
        "st1".to_string(),
        day(d),
        description.to_string(),
        dec(amount),
        kind,
    )
}

#[allow(clippy::too_many_arguments)]
fn cfdi(
    id: &str,
    kind: InvoiceType,
    d: u32,
    emisor: &str,
    receptor: &str,
    subtotal: &str,
    iva: &str,
    total: &str,
) -> Invoice {
    let mut invoice = Invoice::new(
        id.to_string(),
        "user1".to_string(),
        format!("UUID-{id}"),
        kind,
        day(d),
        emisor.to_string(),
        receptor.to_string(),
        dec(subtotal),
        dec(total),
    );
    invoice.iva = Some(dec(iva));
    invoice
}

/// Statement for user1 in March 2024 with a client deposit, a supplier
/// payment and a cash deposit no invoice explains
async fn seeded_ledger(storage: &MemoryStorage) -> ResicoLedger<MemoryStorage> {
    let mut ledger = ResicoLedger::new(storage.clone());

    ledger
        .import_statement(BankStatement::new(
            "st1".to_string(),
            "user1".to_string(),
            "bbva".to_string(),
            march(),
        ))
        .await
        .unwrap();

    ledger
        .import_transactions(vec![
            movement("tx-a", 5, "SPEI ACME CONSULTORIA", "11600.00", TransactionType::Ingreso)
                .with_counterparty_rfc("ACM010101AAA"),
            movement("tx-b", 10, "PAGO PAPELERIA", "580.00", TransactionType::Egreso),
            movement("tx-c", 20, "DEPOSITO EFECTIVO", "999.00", TransactionType::Ingreso),
        ])
        .await
        .unwrap();

    ledger
        .import_invoices(vec![
            cfdi(
                "inv-a",
                InvoiceType::Emitida,
                4,
                "YOO010101AAA",
                "ACM010101AAA",
                "10000.00",
                "1600.00",
                "11600.00",
            ),
            cfdi(
                "inv-b",
                InvoiceType::Recibida,
                9,
                "PAP010101AAA",
                "YOO010101AAA",
                "500.00",
                "80.00",
                "580.00",
            ),
        ])
        .await
        .unwrap();

    ledger
}

#[tokio::test]
async fn test_complete_monthly_workflow() {
    let storage = MemoryStorage::new();
    let mut ledger = seeded_ledger(&storage).await;

    // Auto matching commits the strongest pair first
    let report = ledger.run_auto_matching("user1", march()).await.unwrap();
    assert_eq!(report.total_transactions, 3);
    assert_eq!(report.total_invoices, 2);
    assert!(report.failed.is_empty());

    let applied: Vec<(&str, &str, BigDecimal)> = report
        .applied
        .iter()
        .map(|m| (m.transaction_id.as_str(), m.invoice_id.as_str(), m.confidence.clone()))
        .collect();
    assert_eq!(
        applied,
        vec![("tx-a", "inv-a", dec("0.93")), ("tx-b", "inv-b", dec("0.83"))]
    );

    let tx_a = storage.get_transaction("tx-a").await.unwrap().unwrap();
    assert_eq!(tx_a.matched_invoice_id.as_deref(), Some("inv-a"));
    assert_eq!(tx_a.match_confidence, Some(dec("0.93")));
    assert_eq!(tx_a.match_method, Some(MatchMethod::Auto));

    let inv_b = storage.get_invoice("inv-b").await.unwrap().unwrap();
    assert_eq!(inv_b.matched_transaction_id.as_deref(), Some("tx-b"));

    let attempts = storage.match_attempts().unwrap();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|a| a.was_selected && a.method == MatchMethod::Auto));

    // The cash deposit has no invoice, so the period does not reconcile
    let summary = ledger
        .calculate_reconciliation("user1", march())
        .await
        .unwrap();
    assert_eq!(summary.status, ReconciliationStatus::ConDiferencias);
    assert_eq!(summary.ingresos.banco, dec("12599.00"));
    assert_eq!(summary.ingresos.facturas, dec("11600.00"));
    assert_eq!(summary.ingresos.diferencia, dec("999.00"));
    assert_eq!(summary.egresos.diferencia, BigDecimal::from(0));
    assert_eq!(summary.matched_transactions, 2);
    assert_eq!(summary.unmatched_transactions, 1);
    assert_eq!(summary.unmatched_invoices, 0);

    // Monthly taxes on invoiced income
    let taxes = ledger
        .calculate_period_taxes("user1", march(), IncomeBasis::Facturado)
        .await
        .unwrap();
    assert_eq!(taxes.fecha_limite_pago, NaiveDate::from_ymd_opt(2024, 4, 17).unwrap());
    assert_eq!(taxes.result.isr.tasa, dec("0.01"));
    assert_eq!(taxes.result.isr.isr_por_pagar, dec("100.00"));
    assert_eq!(taxes.result.iva.trasladado, dec("1600.00"));
    assert_eq!(taxes.result.iva.acreditable, dec("80.00"));
    assert_eq!(taxes.result.iva.por_pagar, dec("1520.00"));
    assert_eq!(taxes.result.total_por_pagar, dec("1620.00"));
    assert_eq!(storage.tax_report("user1", march()).unwrap(), Some(taxes));
}

#[tokio::test]
async fn test_rerun_over_settled_data_applies_nothing() {
    let storage = MemoryStorage::new();
    let mut ledger = seeded_ledger(&storage).await;

    let first = ledger.run_auto_matching("user1", march()).await.unwrap();
    assert_eq!(first.applied.len(), 2);

    let second = ledger.run_auto_matching("user1", march()).await.unwrap();
    assert!(second.applied.is_empty());
    assert!(second.failed.is_empty());
    assert_eq!(storage.match_attempts().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_match_write_is_skipped() {
    let storage = MemoryStorage::new();
    let mut ledger = seeded_ledger(&storage).await;
    storage.fail_match_writes_for("tx-a").unwrap();

    let report = ledger.run_auto_matching("user1", march()).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].transaction_id, "tx-a");
    assert_eq!(report.failed[0].invoice_id, "inv-a");
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].transaction_id, "tx-b");

    let tx_a = storage.get_transaction("tx-a").await.unwrap().unwrap();
    assert!(!tx_a.is_matched());
    assert_eq!(storage.match_attempts().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_run_for_same_scope_is_rejected() {
    let storage = MemoryStorage::new();
    let registry = MatchRunRegistry::new();
    let mut ledger = seeded_ledger(&storage)
        .await
        .with_run_registry(registry.clone());

    let permit = registry.try_acquire("user1", march()).unwrap();
    let result = ledger.run_auto_matching("user1", march()).await;
    assert!(matches!(
        result,
        Err(ResicoError::RunInProgress { ref user_id, period })
            if user_id == "user1" && period == march()
    ));
    assert!(storage.match_attempts().unwrap().is_empty());

    drop(permit);
    let report = ledger.run_auto_matching("user1", march()).await.unwrap();
    assert_eq!(report.applied.len(), 2);
    assert!(!registry.is_running("user1", march()));
}

#[tokio::test]
async fn test_manual_match_confirmation() {
    let storage = MemoryStorage::new();
    let mut ledger = seeded_ledger(&storage).await;
    ledger.run_auto_matching("user1", march()).await.unwrap();

    // Invoice for the cash deposit arrives after the run
    let late = Invoice::new(
        "inv-c".to_string(),
        "user1".to_string(),
        "UUID-inv-c".to_string(),
        InvoiceType::Emitida,
        day(20),
        "YOO010101AAA".to_string(),
        "XAXX010101000".to_string(),
        dec("1000.00"),
        dec("1000.00"),
    );
    ledger.import_invoices(vec![late]).await.unwrap();

    let attempt = ledger
        .confirm_manual_match("user1", "tx-c", "inv-c")
        .await
        .unwrap();
    assert_eq!(attempt.method, MatchMethod::Manual);
    assert_eq!(attempt.confidence, Some(dec("0.83")));

    let tx_c = storage.get_transaction("tx-c").await.unwrap().unwrap();
    assert_eq!(tx_c.matched_invoice_id.as_deref(), Some("inv-c"));
    assert_eq!(tx_c.match_method, Some(MatchMethod::Manual));

    assert!(matches!(
        ledger.confirm_manual_match("user1", "tx-c", "inv-c").await,
        Err(ResicoError::AlreadyMatched(_))
    ));
}

#[tokio::test]
async fn test_statement_scoped_matching_run() {
    let storage = MemoryStorage::new();
    let registry = MatchRunRegistry::new();
    let mut ledger = seeded_ledger(&storage)
        .await
        .with_run_registry(registry.clone());

    for (id, user_id) in [("st2", "user1"), ("st-other", "user2")] {
        ledger
            .import_statement(BankStatement::new(
                id.to_string(),
                user_id.to_string(),
                "hsbc".to_string(),
                march(),
            ))
            .await
            .unwrap();
    }
    let mut tx_d = movement("tx-d", 9, "PAGO PAPELERIA", "580.00", TransactionType::Egreso);
    tx_d.statement_id = "st2".to_string();
    ledger.import_transactions(vec![tx_d]).await.unwrap();

    // The period lock covers statement runs as well
    let permit = registry.try_acquire("user1", march()).unwrap();
    assert!(matches!(
        ledger.run_auto_matching_for_statement("user1", "st2").await,
        Err(ResicoError::RunInProgress { .. })
    ));
    drop(permit);

    let report = ledger
        .run_auto_matching_for_statement("user1", "st2")
        .await
        .unwrap();
    assert_eq!(report.statement_id.as_deref(), Some("st2"));
    assert_eq!(report.period, march());
    assert_eq!(report.total_transactions, 1);
    assert_eq!(report.total_invoices, 2);

    let applied: Vec<(&str, &str, BigDecimal)> = report
        .applied
        .iter()
        .map(|m| (m.transaction_id.as_str(), m.invoice_id.as_str(), m.confidence.clone()))
        .collect();
    assert_eq!(applied, vec![("tx-d", "inv-b", dec("0.83"))]);

    // Transactions of the other statement are left alone
    for id in ["tx-a", "tx-b", "tx-c"] {
        let tx = storage.get_transaction(id).await.unwrap().unwrap();
        assert!(!tx.is_matched(), "{id} should stay open");
    }
    assert!(!registry.is_running("user1", march()));

    assert!(matches!(
        ledger.run_auto_matching_for_statement("user1", "st-other").await,
        Err(ResicoError::StatementNotFound(ref id)) if id == "st-other"
    ));
    assert!(matches!(
        ledger.run_auto_matching_for_statement("user1", "missing").await,
        Err(ResicoError::StatementNotFound(_))
    ));
}

#[tokio::test]
async fn test_manual_match_rejections() {
    let storage = MemoryStorage::new();
    let mut ledger = seeded_ledger(&storage).await;

    assert!(matches!(
        ledger.confirm_manual_match("user1", "tx-a", "inv-b").await,
        Err(ResicoError::IncompatibleDirection { .. })
    ));
    assert!(matches!(
        ledger.confirm_manual_match("user2", "tx-a", "inv-a").await,
        Err(ResicoError::TransactionNotFound(_))
    ));
    assert!(matches!(
        ledger.confirm_manual_match("user1", "tx-a", "missing").await,
        Err(ResicoError::InvoiceNotFound(_))
    ));
    assert!(storage.match_attempts().unwrap().is_empty());
}

#[tokio::test]
async fn test_suggestions_are_capped_and_sorted() {
    let storage = MemoryStorage::new();
    let mut ledger = ResicoLedger::new(storage.clone());

    ledger
        .import_statement(BankStatement::new(
            "st1".to_string(),
            "user1".to_string(),
            "santander".to_string(),
            march(),
        ))
        .await
        .unwrap();
    ledger
        .import_transactions(vec![movement(
            "tx1",
            25,
            "TRANSFERENCIA",
            "1000.00",
            TransactionType::Ingreso,
        )
        .with_counterparty_rfc("CLI010101AAA")])
        .await
        .unwrap();

    let invoices = [25, 23, 21, 19, 15, 5]
        .iter()
        .enumerate()
        .map(|(i, d)| {
            cfdi(
                &format!("inv{i}"),
                InvoiceType::Emitida,
                *d,
                "YOO010101AAA",
                "CLI010101AAA",
                "862.07",
                "137.93",
                "1000.00",
            )
        })
        .collect();
    ledger.import_invoices(invoices).await.unwrap();

    let suggestions = ledger.suggest_matches("tx1", march()).await.unwrap();

    let ranked: Vec<(&str, BigDecimal)> = suggestions
        .iter()
        .map(|s| (s.invoice_id.as_str(), s.confidence.clone()))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("inv0", dec("0.93")),
            ("inv1", dec("0.89")),
            ("inv2", dec("0.84")),
            ("inv3", dec("0.78")),
            ("inv4", dec("0.72")),
        ]
    );

    // Suggestions never write anything
    let tx = storage.get_transaction("tx1").await.unwrap().unwrap();
    assert!(!tx.is_matched());
}

#[tokio::test]
async fn test_validation_rejects_malformed_records() {
    let storage = MemoryStorage::new();
    let mut ledger = ResicoLedger::with_validator(storage.clone(), Box::new(StrictRecordValidator));

    ledger
        .import_statement(BankStatement::new(
            "st1".to_string(),
            "user1".to_string(),
            "bbva".to_string(),
            march(),
        ))
        .await
        .unwrap();

    let negative = movement("tx1", 3, "CARGO", "-50.00", TransactionType::Egreso);
    assert!(matches!(
        ledger.import_transactions(vec![negative]).await,
        Err(ResicoError::Validation(_))
    ));

    let blank = movement("tx2", 3, "   ", "50.00", TransactionType::Egreso);
    assert!(ledger.import_transactions(vec![blank]).await.is_err());

    let mut bad_retention = cfdi(
        "inv1",
        InvoiceType::Emitida,
        3,
        "YOO010101AAA",
        "CLI010101AAA",
        "100.00",
        "16.00",
        "116.00",
    );
    bad_retention.retained_isr = dec("-1.25");
    assert!(ledger.import_invoices(vec![bad_retention]).await.is_err());

    assert!(storage
        .list_transactions("user1", march())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_reports_serialize_to_json() {
    let storage = MemoryStorage::new();
    let mut ledger = seeded_ledger(&storage).await;
    let run = ledger.run_auto_matching("user1", march()).await.unwrap();
    let summary = ledger
        .calculate_reconciliation("user1", march())
        .await
        .unwrap();

    let run_json = serde_json::to_value(&run).unwrap();
    assert_eq!(run_json["period"], "2024-03");
    assert_eq!(run_json["applied"][0]["transaction_id"], "tx-a");

    let summary_json = serde_json::to_value(&summary).unwrap();
    assert_eq!(summary_json["status"], "con_diferencias");

    let invoice: Invoice = serde_json::from_str(
        r#"{
            "id": "inv9",
            "user_id": "user1",
            "uuid_fiscal": "6F9619FF-8B86-D011-B42D-00C04FC964FF",
            "type": "recibida",
            "fecha": "2024-03-02",
            "rfc_emisor": "PAP010101AAA",
            "rfc_receptor": "YOO010101AAA",
            "subtotal": "100.00",
            "total": "116.00",
            "period": "2024-03"
        }"#,
    )
    .unwrap();
    assert_eq!(invoice.invoice_type, InvoiceType::Recibida);
    assert!(invoice.is_vigente());
    assert_eq!(invoice.iva_amount(), BigDecimal::from(0));
    assert_eq!(invoice.retained_isr, BigDecimal::from(0));

    let bad_period = serde_json::from_str::<Period>("\"2024-13\"");
    assert!(bad_period.is_err());
}
