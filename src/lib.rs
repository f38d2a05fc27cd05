//! # RESICO Core
//!
//! Bank reconciliation and monthly tax calculation for taxpayers under Mexico's
//! Régimen Simplificado de Confianza (RESICO).
//!
//! ## Features
//!
//! - **Transaction matching**: Weighted scoring of bank movements against CFDI invoices
//! - **Batch assignment**: Greedy 1:1 selection plus top-5 suggestions for manual review
//! - **Reconciliation**: Per-period bank vs invoice totals with a status classification
//! - **Tax calculation**: RESICO ISR brackets, IVA netting and the annual income ceiling
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use resico_core::{calculate_isr, calculate_iva};
//! use bigdecimal::BigDecimal;
//!
//! let isr = calculate_isr(&BigDecimal::from(30_000), &BigDecimal::from(0));
//! assert_eq!(isr.isr_por_pagar, BigDecimal::from(330));
//!
//! let iva = calculate_iva(
//!     &BigDecimal::from(5_000),
//!     &BigDecimal::from(3_000),
//!     &BigDecimal::from(0),
//! );
//! assert_eq!(iva.por_pagar, BigDecimal::from(2_000));
//!
//! // Persisted workflows go through `ResicoLedger` over a `ResicoStorage`
//! // implementation, e.g. `utils::MemoryStorage`.
//! ```

pub mod ledger;
pub mod matching;
pub mod reconciliation;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use ledger::*;
pub use matching::*;
pub use reconciliation::*;
pub use tax::*;
pub use traits::*;
pub use types::*;
