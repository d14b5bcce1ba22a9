//! Transfer request validation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use crate::{
    errors::ValidationError,
    types::{AccountAddress, AccountId, TransferDraft},
    utils::to_base_units,
};

/// Raw transfer input as entered by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub account_id: AccountId,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub asset_type: String,
    pub notes: String,
}

impl TransferRequest {
    pub fn new(
        account_id: AccountId,
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        amount: impl Into<String>,
        asset_type: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount: amount.into(),
            asset_type: asset_type.into(),
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

pub fn parse_amount(value: &str) -> Result<Decimal, ValidationError> {
    Decimal::from_str(value.trim()).map_err(|e| ValidationError::MalformedAmount {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Validates addresses, asset and amount. `decimals` is the precision of
/// `native_asset`, the only asset the engine transfers.
pub fn validate_transfer(
    request: &TransferRequest,
    native_asset: &str,
    decimals: u32,
) -> Result<TransferDraft, ValidationError> {
    let from_address: AccountAddress = request.from_address.trim().parse()?;
    let to_address: AccountAddress = request.to_address.trim().parse()?;
    if from_address == to_address {
        return Err(ValidationError::SameSenderAndRecipient);
    }

    if !request.asset_type.eq_ignore_ascii_case(native_asset) {
        return Err(ValidationError::UnsupportedAsset(request.asset_type.clone()));
    }

    let amount = parse_amount(&request.amount)?;
    to_base_units(amount, decimals)?;

    Ok(TransferDraft {
        account_id: request.account_id,
        from_address,
        to_address,
        amount: amount.normalize(),
        asset_type: native_asset.to_string(),
        notes: request.notes.clone(),
    })
}

pub fn validate_schedule(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if scheduled_at <= now {
        return Err(ValidationError::ScheduleInPast {
            scheduled_at: scheduled_at.to_rfc3339(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(amount: &str) -> TransferRequest {
        TransferRequest::new(
            1,
            format!("0x{}", "aa".repeat(32)),
            format!("0x{}", "bb".repeat(32)),
            amount,
            "APT",
        )
    }

    #[test]
    fn accepts_a_well_formed_transfer() {
        let draft = validate_transfer(&request("1.50"), "APT", 8).unwrap();
        assert_eq!(draft.amount, dec!(1.5));
        assert_eq!(draft.asset_type, "APT");
    }

    #[test]
    fn rejects_bad_amounts() {
        for amount in ["", "abc", "0", "-1", "0.000000001"] {
            assert!(
                matches!(
                    validate_transfer(&request(amount), "APT", 8),
                    Err(ValidationError::MalformedAmount { .. })
                ),
                "amount {amount:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_self_transfer_and_foreign_assets() {
        let mut same = request("1");
        same.to_address = same.from_address.clone();
        assert_eq!(
            validate_transfer(&same, "APT", 8),
            Err(ValidationError::SameSenderAndRecipient)
        );

        let mut usdc = request("1");
        usdc.asset_type = "USDC".to_string();
        assert!(matches!(
            validate_transfer(&usdc, "APT", 8),
            Err(ValidationError::UnsupportedAsset(_))
        ));
    }

    #[test]
    fn rejects_short_address() {
        let mut bad = request("1");
        bad.to_address = "0xBB".to_string();
        assert!(matches!(
            validate_transfer(&bad, "APT", 8),
            Err(ValidationError::MalformedAddress { .. })
        ));
    }
}
