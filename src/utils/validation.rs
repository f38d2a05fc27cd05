//! Validation utilities

use crate::traits::*;
use crate::types::*;

/// Validate the shape of an RFC.
///
/// Legal entities carry 3 letters, individuals 4, followed by a `YYMMDD` date
/// and a 3-character homoclave. `Ñ` and `&` are valid letters.
pub fn validate_rfc(rfc: &str) -> ResicoResult<()> {
    let chars: Vec<char> = rfc.trim().to_uppercase().chars().collect();

    let letters = match chars.len() {
        12 => 3,
        13 => 4,
        _ => {
            return Err(ResicoError::Validation(format!(
                "RFC '{}' must have 12 or 13 characters",
                rfc
            )))
        }
    };

    let (prefix, rest) = chars.split_at(letters);
    let (date, homoclave) = rest.split_at(6);

    if !prefix
        .iter()
        .all(|c| c.is_ascii_uppercase() || *c == 'Ñ' || *c == '&')
    {
        return Err(ResicoError::Validation(format!(
            "RFC '{}' must start with {} letters",
            rfc, letters
        )));
    }

    if !date.iter().all(|c| c.is_ascii_digit()) {
        return Err(ResicoError::Validation(format!(
            "RFC '{}' must contain a YYMMDD date",
            rfc
        )));
    }

    let month = (date[2] as u32 - '0' as u32) * 10 + (date[3] as u32 - '0' as u32);
    let day = (date[4] as u32 - '0' as u32) * 10 + (date[5] as u32 - '0' as u32);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(ResicoError::Validation(format!(
            "RFC '{}' contains an impossible date",
            rfc
        )));
    }

    if !homoclave.iter().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ResicoError::Validation(format!(
            "RFC '{}' has an invalid homoclave",
            rfc
        )));
    }

    Ok(())
}

/// Validate a free-text bank description
pub fn validate_description(description: &str) -> ResicoResult<()> {
    if description.trim().is_empty() {
        return Err(ResicoError::Validation(
            "Transaction description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(ResicoError::Validation(
            "Transaction description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Strict validator: default checks plus RFC shape and description checks
pub struct StrictRecordValidator;

impl RecordValidator for StrictRecordValidator {
    fn validate_transaction(&self, transaction: &BankTransaction) -> ResicoResult<()> {
        DefaultRecordValidator.validate_transaction(transaction)?;
        validate_description(&transaction.description)?;

        if let Some(rfc) = transaction
            .counterparty_rfc
            .as_deref()
            .filter(|rfc| !rfc.is_empty())
        {
            validate_rfc(rfc)?;
        }

        Ok(())
    }

    fn validate_invoice(&self, invoice: &Invoice) -> ResicoResult<()> {
        DefaultRecordValidator.validate_invoice(invoice)?;
        validate_rfc(&invoice.rfc_emisor)?;
        validate_rfc(&invoice.rfc_receptor)?;
        Ok(())
    }
}
