//! ISR (income tax) under the RESICO regime

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::tax::TaxError;
use crate::utils::decimal::{decimal, non_negative, round_cents};

/// Annual income ceiling for staying in RESICO, in MXN
pub fn resico_annual_limit() -> BigDecimal {
    BigDecimal::from(3_500_000)
}

/// Simplified average ISR rate, for estimates that skip the bracket lookup
pub fn isr_resico_flat_rate() -> BigDecimal {
    decimal(125, 4)
}

/// One row of the monthly ISR table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Lower bound, inclusive
    pub min_income: BigDecimal,
    /// Upper bound, inclusive
    pub max_income: BigDecimal,
    /// Rate applied to the whole monthly income
    pub rate: BigDecimal,
}

impl TaxBracket {
    pub fn new(min_income: BigDecimal, max_income: BigDecimal, rate: BigDecimal) -> Self {
        Self {
            min_income,
            max_income,
            rate,
        }
    }

    pub fn contains(&self, income: &BigDecimal) -> bool {
        *income >= self.min_income && *income <= self.max_income
    }
}

/// Monthly ISR table: ascending brackets partitioning [0, ceiling] at cent resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>", into = "Vec<TaxBracket>")]
pub struct IsrTable {
    brackets: Vec<TaxBracket>,
}

impl Default for IsrTable {
    fn default() -> Self {
        Self::resico_2024()
    }
}

impl IsrTable {
    /// Build a table, checking that the brackets cover every cent from zero
    /// without overlapping
    pub fn new(brackets: Vec<TaxBracket>) -> Result<Self, TaxError> {
        let table = Self { brackets };
        table.validate()?;
        Ok(table)
    }

    /// Check the bracket invariants of an existing table
    pub fn validate(&self) -> Result<(), TaxError> {
        let brackets = &self.brackets;
        let first = brackets
            .first()
            .ok_or_else(|| TaxError::InvalidBracket("ISR table cannot be empty".to_string()))?;

        if first.min_income != BigDecimal::from(0) {
            return Err(TaxError::InvalidBracket(format!(
                "First bracket must start at 0, starts at {}",
                first.min_income
            )));
        }

        for bracket in brackets {
            if bracket.min_income > bracket.max_income {
                return Err(TaxError::InvalidBracket(format!(
                    "Bracket {}-{} has min above max",
                    bracket.min_income, bracket.max_income
                )));
            }
            if bracket.rate < BigDecimal::from(0) || bracket.rate > BigDecimal::from(1) {
                return Err(TaxError::InvalidBracket(format!(
                    "Rate {} is outside [0, 1]",
                    bracket.rate
                )));
            }
        }

        for pair in brackets.windows(2) {
            let gap = &pair[1].min_income - &pair[0].max_income;
            if gap <= BigDecimal::from(0) || gap > decimal(1, 2) {
                return Err(TaxError::InvalidBracket(format!(
                    "Bracket starting at {} must begin one cent after {}",
                    pair[1].min_income, pair[0].max_income
                )));
            }
        }

        Ok(())
    }

    /// SAT 2024 monthly table for RESICO individuals
    pub fn resico_2024() -> Self {
        Self {
            brackets: vec![
                TaxBracket::new(BigDecimal::from(0), BigDecimal::from(25_000), decimal(1, 2)),
                TaxBracket::new(decimal(2_500_001, 2), BigDecimal::from(50_000), decimal(11, 3)),
                TaxBracket::new(decimal(5_000_001, 2), decimal(8_333_333, 2), decimal(15, 3)),
                TaxBracket::new(decimal(8_333_334, 2), decimal(20_833_333, 2), decimal(2, 2)),
                TaxBracket::new(
                    decimal(20_833_334, 2),
                    BigDecimal::from(3_500_000),
                    decimal(25, 3),
                ),
            ],
        }
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Rate of the first bracket containing `income`; incomes past the last
    /// bracket use its rate. Lookup happens at cent resolution and negative
    /// incomes are treated as zero.
    pub fn rate_for(&self, income: &BigDecimal) -> BigDecimal {
        let income = round_cents(&non_negative(income.clone()));

        self.brackets
            .iter()
            .find(|bracket| bracket.contains(&income))
            .or_else(|| self.brackets.last())
            .map(|bracket| bracket.rate.clone())
            .unwrap_or_else(|| BigDecimal::from(0))
    }
}

impl TryFrom<Vec<TaxBracket>> for IsrTable {
    type Error = TaxError;

    fn try_from(brackets: Vec<TaxBracket>) -> Result<Self, Self::Error> {
        IsrTable::new(brackets)
    }
}

impl From<IsrTable> for Vec<TaxBracket> {
    fn from(table: IsrTable) -> Self {
        table.brackets
    }
}

/// Monthly ISR breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsrCalculation {
    /// Taxable base (monthly income)
    pub base_gravable: BigDecimal,
    /// Rate from the table
    pub tasa: BigDecimal,
    /// ISR caused by the income
    pub isr_causado: BigDecimal,
    /// ISR already withheld by clients
    pub isr_retenido: BigDecimal,
    /// ISR still to pay, never negative
    pub isr_por_pagar: BigDecimal,
}

/// Rate for a monthly income under the default 2024 table
pub fn get_isr_rate(monthly_income: &BigDecimal) -> BigDecimal {
    IsrTable::default().rate_for(monthly_income)
}

/// Monthly ISR under the default 2024 table
pub fn calculate_isr(monthly_income: &BigDecimal, isr_withheld: &BigDecimal) -> IsrCalculation {
    calculate_isr_with_table(&IsrTable::default(), monthly_income, isr_withheld)
}

/// Monthly ISR: `income x rate`, minus what clients already withheld
pub fn calculate_isr_with_table(
    table: &IsrTable,
    monthly_income: &BigDecimal,
    isr_withheld: &BigDecimal,
) -> IsrCalculation {
    let base = non_negative(monthly_income.clone());
    let tasa = table.rate_for(&base);
    let causado = &base * &tasa;
    let por_pagar = non_negative(&causado - isr_withheld);

    IsrCalculation {
        base_gravable: round_cents(&base),
        tasa,
        isr_causado: round_cents(&causado),
        isr_retenido: round_cents(isr_withheld),
        isr_por_pagar: round_cents(&por_pagar),
    }
}

/// How close a taxpayer is to leaving RESICO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResicoLimitStatus {
    pub exceeded: bool,
    /// Income left before the ceiling, never negative
    pub remaining: BigDecimal,
    /// Share of the ceiling already used, in percent
    pub percentage: BigDecimal,
}

pub fn check_resico_limit(annual_income: &BigDecimal) -> ResicoLimitStatus {
    let limit = resico_annual_limit();

    ResicoLimitStatus {
        exceeded: *annual_income > limit,
        remaining: round_cents(&non_negative(&limit - annual_income)),
        percentage: round_cents(&(annual_income * BigDecimal::from(100) / &limit)),
    }
}
