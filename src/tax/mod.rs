//! RESICO tax calculation: ISR brackets, IVA netting and period reports

pub mod isr;
pub mod iva;
pub mod summary;

pub use isr::*;
pub use iva::*;
pub use summary::*;

/// Tax-table errors
#[derive(Debug, thiserror::Error)]
pub enum TaxError {
    #[error("Invalid ISR bracket: {0}")]
    InvalidBracket(String),
}
