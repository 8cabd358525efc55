// Copyright 2021-2022 CipherSwap Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! Boundaries used while negotiating: the rate service and the counterparty.

use async_trait::async_trait;

use crate::blockchain::{Amount, Asset};
use crate::swap::{NegotiationError, Participant, SwapId, SwapIntent, ValidationError};

/// A rate quote, valid until `expires_at` (unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Units of `to` per unit of `from`.
    pub rate: f64,
    pub expires_at: u64,
}

/// Source of exchange rates.
#[async_trait]
pub trait RateService: Send + Sync {
    async fn get_rate(&self, from: Asset, to: Asset) -> Result<Quote, NegotiationError>;
}

/// Offer sent to the counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapOffer {
    pub swap_id: SwapId,
    pub from: Asset,
    pub to: Asset,
    /// Amount of `from` sold by the maker.
    pub amount: Amount,
    /// Amount of `to` expected from the taker.
    pub counter_amount: Amount,
    pub rate: f64,
    pub maker: Participant,
}

/// The counterparty accepted, binding the taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub taker: Participant,
}

/// The other side of the swap.
#[async_trait]
pub trait Counterparty: Send + Sync {
    async fn negotiate(&self, offer: &SwapOffer) -> Result<Agreement, NegotiationError>;
}

/// Drift between two rates in basis points, rounded up.
pub fn drift_bps(expected: f64, actual: f64) -> u32 {
    let drift = ((actual - expected) / expected).abs() * 10_000.0;
    if drift.is_finite() {
        drift.ceil().min(u32::MAX as f64) as u32
    } else {
        u32::MAX
    }
}

/// Check that the intent and the fresh quote are both unexpired at `now` and that the quoted rate
/// drifts at most `tolerance_bps` from the intent rate.
pub fn check_quote(
    intent: &SwapIntent,
    quote: &Quote,
    tolerance_bps: u32,
    now: u64,
) -> Result<(), ValidationError> {
    if intent.quote_expires_at <= now {
        return Err(ValidationError::StaleQuote {
            expired_at: intent.quote_expires_at,
        });
    }
    if quote.expires_at <= now {
        return Err(ValidationError::StaleQuote {
            expired_at: quote.expires_at,
        });
    }
    if !quote.rate.is_finite() || quote.rate <= 0.0 {
        return Err(ValidationError::InvalidRate(quote.rate));
    }
    let drift = drift_bps(intent.rate, quote.rate);
    if drift > tolerance_bps {
        return Err(ValidationError::SlippageExceeded {
            drift_bps: drift,
            tolerance_bps,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(rate: f64) -> SwapIntent {
        SwapIntent {
            from: Asset::Eth,
            to: Asset::Xmr,
            amount: 10u128.pow(18),
            rate,
            slippage_bps: None,
            maker: Participant {
                identity: "maker".into(),
                receive_address: "4maker".into(),
                refund_address: "0xmaker".into(),
            },
            taker: None,
            quote_expires_at: 1_000,
        }
    }

    #[test]
    fn drift_in_basis_points() {
        assert_eq!(drift_bps(20.0, 20.0), 0);
        assert_eq!(drift_bps(20.0, 20.2), 100);
        assert_eq!(drift_bps(20.0, 19.8), 100);
        assert_eq!(drift_bps(0.0, 1.0), u32::MAX);
    }

    #[test]
    fn quotes_within_tolerance_pass() {
        let quote = Quote {
            rate: 20.1,
            expires_at: 2_000,
        };
        assert!(check_quote(&intent(20.0), &quote, 100, 500).is_ok());
        assert!(matches!(
            check_quote(&intent(20.0), &quote, 10, 500),
            Err(ValidationError::SlippageExceeded { .. })
        ));
    }

    #[test]
    fn stale_quotes_fail() {
        let quote = Quote {
            rate: 20.0,
            expires_at: 600,
        };
        assert_eq!(
            check_quote(&intent(20.0), &quote, 100, 600),
            Err(ValidationError::StaleQuote { expired_at: 600 })
        );
        assert_eq!(
            check_quote(&intent(20.0), &quote, 100, 1_000),
            Err(ValidationError::StaleQuote { expired_at: 1_000 })
        );
    }
}
