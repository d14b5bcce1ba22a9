//! Trade request validation

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use crate::{errors::ValidationError, types::TradeRequest};

// Weights go on-chain in basis points, prices with 8 decimals.
pub const WEIGHT_DECIMALS: u32 = 4;
pub const PRICE_DECIMALS: u32 = 8;

pub fn validate_trade(request: &TradeRequest, max_leverage: u32) -> Result<(), ValidationError> {
    let invalid = |reason: String| Err(ValidationError::InvalidTrade(reason));

    if request.assets.is_empty() {
        return invalid("at least one asset is required".to_string());
    }
    if request.prices.len() != request.assets.len() {
        return invalid(format!(
            "{} prices for {} assets",
            request.prices.len(),
            request.assets.len()
        ));
    }

    let mut symbols = HashSet::new();
    for asset in &request.assets {
        if asset.symbol.trim().is_empty() {
            return invalid("asset symbol is empty".to_string());
        }
        if !symbols.insert(asset.symbol.as_str()) {
            return invalid(format!("duplicate asset {}", asset.symbol));
        }
        if asset.weight <= Decimal::ZERO {
            return invalid(format!("weight of {} must be positive", asset.symbol));
        }
        if asset.weight.normalize().scale() > WEIGHT_DECIMALS {
            return invalid(format!("weight of {} is finer than one basis point", asset.symbol));
        }
    }

    let total: Decimal = request.assets.iter().map(|a| a.weight).sum();
    if total != dec!(1) {
        return invalid(format!("weights sum to {}, expected 1", total));
    }

    for (asset, price) in request.assets.iter().zip(&request.prices) {
        if *price <= Decimal::ZERO {
            return invalid(format!("price of {} must be positive", asset.symbol));
        }
        if price.normalize().scale() > PRICE_DECIMALS {
            return invalid(format!("price of {} has more than {} decimals", asset.symbol, PRICE_DECIMALS));
        }
    }

    if request.leverage == 0 || request.leverage > max_leverage {
        return invalid(format!(
            "leverage {} outside 1..={}",
            request.leverage, max_leverage
        ));
    }
    if request.collateral <= Decimal::ZERO {
        return invalid("collateral must be positive".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetWeight;

    fn request() -> TradeRequest {
        TradeRequest {
            assets: vec![AssetWeight::new("BTC", dec!(0.6)), AssetWeight::new("ETH", dec!(0.4))],
            prices: vec![dec!(64000), dec!(3100.5)],
            collateral: dec!(10),
            leverage: 5,
            is_long: true,
        }
    }

    #[test]
    fn accepts_balanced_basket() {
        assert!(validate_trade(&request(), 150).is_ok());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut r = request();
        r.assets[1].weight = dec!(0.3);
        assert!(validate_trade(&r, 150).is_err());
    }

    #[test]
    fn prices_must_line_up_with_assets() {
        let mut r = request();
        r.prices.pop();
        assert!(validate_trade(&r, 150).is_err());
    }

    #[test]
    fn leverage_is_bounded() {
        let mut r = request();
        r.leverage = 151;
        assert!(validate_trade(&r, 150).is_err());
        r.leverage = 0;
        assert!(validate_trade(&r, 150).is_err());
    }
}
