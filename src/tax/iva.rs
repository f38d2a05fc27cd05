//! IVA (value-added tax) netting

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::utils::decimal::{decimal, non_negative, round_cents};

/// General IVA rate (16%)
pub fn iva_general_rate() -> BigDecimal {
    decimal(16, 2)
}

/// Northern/southern border zone IVA rate (8%)
pub fn iva_frontera_rate() -> BigDecimal {
    decimal(8, 2)
}

/// IVA withheld by corporate clients, two thirds of 16%
pub fn iva_retention_rate() -> BigDecimal {
    decimal(1067, 4)
}

/// Monthly IVA position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvaCalculation {
    /// IVA charged on issued invoices
    pub trasladado: BigDecimal,
    /// IVA paid on received invoices
    pub acreditable: BigDecimal,
    /// IVA withheld by clients
    pub retenido: BigDecimal,
    pub por_pagar: BigDecimal,
    pub a_favor: BigDecimal,
}

/// Net `trasladado - acreditable - retenido` into a payable/in-favor pair.
/// At most one side is nonzero.
pub fn calculate_iva(
    trasladado: &BigDecimal,
    acreditable: &BigDecimal,
    retenido: &BigDecimal,
) -> IvaCalculation {
    let diferencia = trasladado - acreditable - retenido;

    IvaCalculation {
        trasladado: round_cents(trasladado),
        acreditable: round_cents(acreditable),
        retenido: round_cents(retenido),
        por_pagar: round_cents(&non_negative(diferencia.clone())),
        a_favor: round_cents(&non_negative(-diferencia)),
    }
}
