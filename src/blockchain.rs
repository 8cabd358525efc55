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

//! Chains and assets a swap can move between, their timelock flavour and the chain clock used to
//! decide when a timelock has expired.
//!
//! Monero expresses timelocks as block heights, EVM chains as unix timestamps. To compare the two
//! legs of a swap every timelock also carries an estimated deadline in unix seconds.

use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;

use crate::consensus::{self, Decodable, Encodable};

/// Amount expressed in the smallest unit of an asset (piconero, wei, token base unit).
pub type Amount = u128;

/// Blockchains with an HTLC adapter.
#[derive(
    Display, Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(Debug)]
pub enum Chain {
    /// Monero, privacy transactions with a script-like lock committed in the tx extra.
    Monero,
    /// Ethereum mainnet.
    Ethereum,
    /// Polygon PoS.
    Polygon,
    /// BNB smart chain.
    Bsc,
    /// Avalanche C-chain.
    Avalanche,
    /// Arbitrum One.
    Arbitrum,
    /// Optimism.
    Optimism,
}

/// How a chain expresses absolute timelocks.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum TimelockKind {
    /// Absolute block height.
    Height,
    /// Absolute unix timestamp in seconds.
    Timestamp,
}

impl Chain {
    /// Returns all supported chains.
    pub fn all() -> [Chain; 7] {
        [
            Chain::Monero,
            Chain::Ethereum,
            Chain::Polygon,
            Chain::Bsc,
            Chain::Avalanche,
            Chain::Arbitrum,
            Chain::Optimism,
        ]
    }

    /// EVM chain id, `None` for Monero.
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            Chain::Monero => None,
            Chain::Ethereum => Some(1),
            Chain::Polygon => Some(137),
            Chain::Bsc => Some(56),
            Chain::Avalanche => Some(43114),
            Chain::Arbitrum => Some(42161),
            Chain::Optimism => Some(10),
        }
    }

    /// Returns true for EVM compatible chains.
    pub fn is_evm(&self) -> bool {
        self.evm_chain_id().is_some()
    }

    /// The timelock flavour enforced by the chain.
    pub fn timelock_kind(&self) -> TimelockKind {
        match self {
            Chain::Monero => TimelockKind::Height,
            _ => TimelockKind::Timestamp,
        }
    }

    /// Average block interval, used to convert durations into heights.
    pub fn block_time(&self) -> Duration {
        match self {
            Chain::Monero => Duration::from_secs(120),
            Chain::Ethereum => Duration::from_secs(12),
            Chain::Polygon => Duration::from_secs(2),
            Chain::Bsc => Duration::from_secs(3),
            Chain::Avalanche => Duration::from_secs(2),
            Chain::Arbitrum => Duration::from_secs(1),
            Chain::Optimism => Duration::from_secs(2),
        }
    }

    /// Default number of confirmations before a lock is considered final.
    pub fn default_confirmations(&self) -> u32 {
        match self {
            Chain::Monero => 10,
            Chain::Ethereum => 12,
            Chain::Polygon => 128,
            Chain::Bsc => 15,
            Chain::Avalanche => 12,
            Chain::Arbitrum => 20,
            Chain::Optimism => 20,
        }
    }

    /// Compute the absolute timelock expiring `duration` after `now` along with its estimated
    /// deadline in unix seconds.
    pub fn timelock_after(&self, now: ChainTime, duration: Duration) -> (Timelock, u64) {
        let deadline = now.timestamp.saturating_add(duration.as_secs());
        let timelock = match self.timelock_kind() {
            TimelockKind::Height => {
                let block = self.block_time().as_secs().max(1);
                let blocks = (duration.as_secs() + block - 1) / block;
                Timelock::Height(now.height.saturating_add(blocks))
            }
            TimelockKind::Timestamp => Timelock::Timestamp(deadline),
        };
        (timelock, deadline)
    }
}

impl Encodable for Chain {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let tag: u8 = match self {
            Chain::Monero => 0x01,
            Chain::Ethereum => 0x02,
            Chain::Polygon => 0x03,
            Chain::Bsc => 0x04,
            Chain::Avalanche => 0x05,
            Chain::Arbitrum => 0x06,
            Chain::Optimism => 0x07,
        };
        tag.consensus_encode(writer)
    }
}

impl Decodable for Chain {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(Chain::Monero),
            0x02u8 => Ok(Chain::Ethereum),
            0x03u8 => Ok(Chain::Polygon),
            0x04u8 => Ok(Chain::Bsc),
            0x05u8 => Ok(Chain::Avalanche),
            0x06u8 => Ok(Chain::Arbitrum),
            0x07u8 => Ok(Chain::Optimism),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(Chain);

impl FromStr for Chain {
    type Err = consensus::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monero" | "xmr" => Ok(Chain::Monero),
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "polygon" => Ok(Chain::Polygon),
            "bsc" => Ok(Chain::Bsc),
            "avalanche" => Ok(Chain::Avalanche),
            "arbitrum" => Ok(Chain::Arbitrum),
            "optimism" => Ok(Chain::Optimism),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

/// Tradable assets. Tokens live on the chain of their contract.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Xmr,
    Eth,
    Matic,
    Bnb,
    Avax,
    Usdc,
    Usdt,
    Dai,
    Link,
    Uni,
    Wbtc,
    Aave,
}

impl Asset {
    /// The chain the asset is transferred on.
    pub fn chain(&self) -> Chain {
        match self {
            Asset::Xmr => Chain::Monero,
            Asset::Matic => Chain::Polygon,
            Asset::Bnb => Chain::Bsc,
            Asset::Avax => Chain::Avalanche,
            _ => Chain::Ethereum,
        }
    }

    /// Number of decimals of the smallest unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Asset::Xmr => 12,
            Asset::Usdc | Asset::Usdt => 6,
            Asset::Wbtc => 8,
            _ => 18,
        }
    }

    /// ERC-20 contract of a token, `None` for native assets.
    pub fn token_contract(&self) -> Option<&'static str> {
        match self {
            Asset::Usdc => Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            Asset::Usdt => Some("0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            Asset::Dai => Some("0x6B175474E89094C44Da98b954EedeAC495271d0F"),
            Asset::Link => Some("0x514910771AF9Ca656af840dff83E8264EcF986CA"),
            Asset::Uni => Some("0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984"),
            Asset::Wbtc => Some("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
            Asset::Aave => Some("0x7Fc66500c84A76Ad7e9c93437bFc5Ac33E63DD9E"),
            _ => None,
        }
    }

    /// Amount of `thousandths` of a whole coin in atomic units.
    pub fn milli_units(&self, thousandths: u128) -> Amount {
        thousandths * 10u128.pow(self.decimals() - 3)
    }

    /// Parse a decimal string such as `"0.01"` into atomic units.
    pub fn parse_amount(&self, s: &str) -> Result<Amount, consensus::Error> {
        let decimals = self.decimals() as usize;
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(consensus::Error::ParseFailed("empty amount"));
        }
        if frac.len() > decimals {
            return Err(consensus::Error::ParseFailed("too many decimals"));
        }
        let digits = |part: &str| -> Result<Amount, consensus::Error> {
            if part.is_empty() {
                return Ok(0);
            }
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(consensus::Error::ParseFailed("invalid digit in amount"));
            }
            part.parse::<Amount>()
                .map_err(|_| consensus::Error::ParseFailed("amount overflow"))
        };
        let scale = 10u128.pow(decimals as u32);
        let frac = digits(frac)? * 10u128.pow((decimals - frac.len()) as u32);
        digits(whole)?
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac))
            .ok_or(consensus::Error::ParseFailed("amount overflow"))
    }

    /// Format atomic units as a decimal string without trailing zeros.
    pub fn format_amount(&self, amount: Amount) -> String {
        let scale = 10u128.pow(self.decimals());
        let whole = amount / scale;
        let frac = amount % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:0width$}", frac, width = self.decimals() as usize);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    /// Convert an amount of `self` into `to` at `rate` (units of `to` per unit of `self`),
    /// rounding down. Returns `None` when the rate is not a positive finite number.
    pub fn convert(&self, amount: Amount, to: Asset, rate: f64) -> Option<Amount> {
        if !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        let shift = to.decimals() as i32 - self.decimals() as i32;
        let value = amount as f64 * rate * 10f64.powi(shift);
        if !value.is_finite() || value >= u128::MAX as f64 {
            return None;
        }
        Some(value.floor() as Amount)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Asset::Xmr => "XMR",
            Asset::Eth => "ETH",
            Asset::Matic => "MATIC",
            Asset::Bnb => "BNB",
            Asset::Avax => "AVAX",
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
            Asset::Dai => "DAI",
            Asset::Link => "LINK",
            Asset::Uni => "UNI",
            Asset::Wbtc => "WBTC",
            Asset::Aave => "AAVE",
        };
        f.write_str(symbol)
    }
}

impl FromStr for Asset {
    type Err = consensus::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "XMR" => Ok(Asset::Xmr),
            "ETH" => Ok(Asset::Eth),
            "MATIC" => Ok(Asset::Matic),
            "BNB" => Ok(Asset::Bnb),
            "AVAX" => Ok(Asset::Avax),
            "USDC" => Ok(Asset::Usdc),
            "USDT" => Ok(Asset::Usdt),
            "DAI" => Ok(Asset::Dai),
            "LINK" => Ok(Asset::Link),
            "UNI" => Ok(Asset::Uni),
            "WBTC" => Ok(Asset::Wbtc),
            "AAVE" => Ok(Asset::Aave),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

/// Absolute timelock of a contract.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Timelock {
    /// Expires once the chain is strictly past this height.
    #[display("height {0}")]
    Height(u64),
    /// Expires once the chain clock is strictly past this unix timestamp.
    #[display("timestamp {0}")]
    Timestamp(u64),
}

impl Timelock {
    /// The flavour of the timelock.
    pub fn kind(&self) -> TimelockKind {
        match self {
            Timelock::Height(_) => TimelockKind::Height,
            Timelock::Timestamp(_) => TimelockKind::Timestamp,
        }
    }

    /// True once chain time is strictly greater than the timelock. Reaching the exact height or
    /// timestamp is not enough.
    pub fn is_expired(&self, now: ChainTime) -> bool {
        match self {
            Timelock::Height(h) => now.height > *h,
            Timelock::Timestamp(t) => now.timestamp > *t,
        }
    }
}

impl Encodable for Timelock {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let (tag, value) = match self {
            Timelock::Height(h) => (0x01u8, h),
            Timelock::Timestamp(t) => (0x02u8, t),
        };
        Ok(tag.consensus_encode(writer)? + value.consensus_encode(writer)?)
    }
}

impl Decodable for Timelock {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(Timelock::Height(Decodable::consensus_decode(d)?)),
            0x02u8 => Ok(Timelock::Timestamp(Decodable::consensus_decode(d)?)),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(Timelock);

/// Chain clock as reported by a node: tip height and tip block timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[display("height {height} at {timestamp}")]
pub struct ChainTime {
    /// Height of the chain tip.
    pub height: u64,
    /// Timestamp of the chain tip in unix seconds.
    pub timestamp: u64,
}

fixed_hash::construct_fixed_hash!(
    /// Transaction hash on any supported chain.
    #[derive(Serialize, Deserialize)]
    pub struct TxId(32);
);

impl Encodable for TxId {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(writer)
    }
}

impl Decodable for TxId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self(Decodable::consensus_decode(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};

    #[test]
    fn parse_and_format_amounts() {
        assert_eq!(Asset::Xmr.parse_amount("0.01").unwrap(), 10_000_000_000);
        assert_eq!(Asset::Eth.parse_amount("1000").unwrap(), 10u128.pow(21));
        assert_eq!(Asset::Usdc.parse_amount(".5").unwrap(), 500_000);
        assert!(Asset::Usdc.parse_amount("0.0000001").is_err());
        assert!(Asset::Eth.parse_amount("1e3").is_err());
        assert!(Asset::Eth.parse_amount("").is_err());
        assert_eq!(Asset::Xmr.format_amount(2_500_000_000_000), "2.5");
        assert_eq!(Asset::Xmr.format_amount(3_000_000_000_000), "3");
        assert_eq!(Asset::Xmr.milli_units(10), Asset::Xmr.parse_amount("0.01").unwrap());
    }

    #[test]
    fn convert_between_decimals() {
        // 2 XMR at 0.0035 ETH per XMR
        let wei = Asset::Xmr
            .convert(Asset::Xmr.parse_amount("2").unwrap(), Asset::Eth, 0.0035)
            .unwrap();
        assert_eq!(wei / 10u128.pow(12), 7_000);
        assert!(Asset::Xmr.convert(1, Asset::Eth, 0.0).is_none());
        assert!(Asset::Xmr.convert(1, Asset::Eth, f64::NAN).is_none());
    }

    #[test]
    fn timelock_expiry_is_strict() {
        let lock = Timelock::Height(100);
        assert!(!lock.is_expired(ChainTime {
            height: 100,
            timestamp: 0
        }));
        assert!(lock.is_expired(ChainTime {
            height: 101,
            timestamp: 0
        }));
        let lock = Timelock::Timestamp(1_000);
        assert!(!lock.is_expired(ChainTime {
            height: 0,
            timestamp: 1_000
        }));
        assert!(lock.is_expired(ChainTime {
            height: 0,
            timestamp: 1_001
        }));
    }

    #[test]
    fn timelock_after_duration() {
        let now = ChainTime {
            height: 1_000,
            timestamp: 1_700_000_000,
        };
        let (lock, deadline) = Chain::Monero.timelock_after(now, Duration::from_secs(48 * 3600));
        assert_eq!(lock, Timelock::Height(1_000 + 1_440));
        assert_eq!(deadline, 1_700_000_000 + 48 * 3600);
        let (lock, _) = Chain::Ethereum.timelock_after(now, Duration::from_secs(24 * 3600));
        assert_eq!(lock, Timelock::Timestamp(1_700_000_000 + 24 * 3600));
    }

    #[test]
    fn chain_and_asset_identifiers() {
        for chain in Chain::all() {
            assert_eq!(deserialize::<Chain>(&serialize(&chain)).unwrap(), chain);
            assert_eq!(chain.to_string().parse::<Chain>().unwrap(), chain);
        }
        assert_eq!("usdc".parse::<Asset>().unwrap(), Asset::Usdc);
        assert_eq!(Asset::Usdc.chain(), Chain::Ethereum);
        assert_eq!(Asset::Xmr.chain().timelock_kind(), TimelockKind::Height);
        assert!(Asset::Eth.token_contract().is_none());
        let timelock = Timelock::Timestamp(42);
        assert_eq!(deserialize::<Timelock>(&serialize(&timelock)).unwrap(), timelock);
    }
}
