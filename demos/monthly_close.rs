//! Monthly close example: import a statement and CFDIs, match, reconcile and
//! compute the RESICO filing

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use resico_core::utils::MemoryStorage;
use resico_core::{
    check_resico_limit, BankStatement, BankTransaction, IncomeBasis, Invoice, InvoiceType,
    Period, ResicoLedger, TransactionType,
};
use std::str::FromStr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("RESICO Core - Monthly Close Example\n");

    let period: Period = "2024-05".parse()?;
    let storage = MemoryStorage::new();
    let mut ledger = ResicoLedger::new(storage.clone());

    // 1. Bank statement and its movements
    ledger
        .import_statement(BankStatement::new(
            "st-2024-05".to_string(),
            "user1".to_string(),
            "banorte".to_string(),
            period,
        ))
        .await?;

    let on = |day: u32| NaiveDate::from_ymd_opt(2024, 5, day).ok_or("invalid date");

    ledger
        .import_transactions(vec![
            BankTransaction::new(
                "mov-1".to_string(),
                "st-2024-05".to_string(),
                on(3)?,
                "SPEI RECIBIDO GRUPO NORTE".to_string(),
                BigDecimal::from_str("34800.00")?,
                TransactionType::Ingreso,
            )
            .with_counterparty_rfc("GNO150101AB1"),
            BankTransaction::new(
                "mov-2".to_string(),
                "st-2024-05".to_string(),
                on(8)?,
                "PAGO RENTA OFICINA".to_string(),
                BigDecimal::from_str("9280.00")?,
                TransactionType::Egreso,
            ),
            BankTransaction::new(
                "mov-3".to_string(),
                "st-2024-05".to_string(),
                on(21)?,
                "DEPOSITO EFECTIVO".to_string(),
                BigDecimal::from_str("1500.00")?,
                TransactionType::Ingreso,
            ),
        ])
        .await?;

    // 2. CFDIs issued and received in the month
    let mut honorarios = Invoice::new(
        "cfdi-1".to_string(),
        "user1".to_string(),
        "1D2C3B4A-0000-4000-8000-000000000001".to_string(),
        InvoiceType::Emitida,
        on(2)?,
        "PEGJ800101AB2".to_string(),
        "GNO150101AB1".to_string(),
        BigDecimal::from(30_000),
        BigDecimal::from_str("34800.00")?,
    );
    honorarios.iva = Some(BigDecimal::from(4_800));
    honorarios.nombre_receptor = Some("Grupo Norte SA de CV".to_string());
    honorarios.concepto = Some("Servicios de consultoria".to_string());

    let mut renta = Invoice::new(
        "cfdi-2".to_string(),
        "user1".to_string(),
        "1D2C3B4A-0000-4000-8000-000000000002".to_string(),
        InvoiceType::Recibida,
        on(7)?,
        "INM100101XY9".to_string(),
        "PEGJ800101AB2".to_string(),
        BigDecimal::from(8_000),
        BigDecimal::from_str("9280.00")?,
    );
    renta.iva = Some(BigDecimal::from(1_280));
    renta.concepto = Some("Renta de oficina mayo".to_string());

    ledger.import_invoices(vec![honorarios, renta]).await?;

    // 3. Automatic matching
    println!("Matching transactions to invoices...");
    let run = ledger.run_auto_matching("user1", period).await?;
    for result in &run.applied {
        println!(
            "  {} -> {} (confidence {})",
            result.transaction_id, result.invoice_id, result.confidence
        );
    }

    let suggestions = ledger.suggest_matches("mov-3", period).await?;
    println!("  Suggestions for mov-3: {}", suggestions.len());
    println!();

    // 4. Reconciliation
    let summary = ledger.calculate_reconciliation("user1", period).await?;
    println!("Reconciliation {}: {:?}", summary.period, summary.status);
    println!(
        "  Ingresos: banco {} / facturas {} (diferencia {})",
        summary.ingresos.banco, summary.ingresos.facturas, summary.ingresos.diferencia
    );
    println!(
        "  Egresos:  banco {} / facturas {} (diferencia {})",
        summary.egresos.banco, summary.egresos.facturas, summary.egresos.diferencia
    );
    println!();

    // 5. Monthly taxes
    let report = ledger
        .calculate_period_taxes("user1", period, IncomeBasis::Facturado)
        .await?;
    println!("Taxes for {} (due {})", report.period, report.fecha_limite_pago);
    println!(
        "  ISR: base {} x {} = {}",
        report.result.isr.base_gravable, report.result.isr.tasa, report.result.isr.isr_por_pagar
    );
    println!(
        "  IVA: trasladado {} - acreditable {} = {}",
        report.result.iva.trasladado, report.result.iva.acreditable, report.result.iva.por_pagar
    );
    println!("  Total a pagar: {}", report.result.total_por_pagar);
    println!();

    // 6. Annual ceiling
    let limit = ledger.annual_limit_status("user1", 2024).await?;
    println!(
        "Annual RESICO limit used: {}% (remaining {})",
        limit.percentage, limit.remaining
    );

    let projected = check_resico_limit(&BigDecimal::from(3_600_000));
    println!("Projected 3,600,000 exceeds limit: {}", projected.exceeded);

    println!("\nExample completed successfully!");
    Ok(())
}
