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

//! Session-scoped configuration of the coordinator. [`SwapConfig`] is read from YAML, every field
//! has a default and the whole configuration is validated before use. Durations are written in
//! seconds, RPC delays in milliseconds and amounts as strings of atomic units.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::blockchain::{Amount, Asset, Chain};
use crate::privacy::{DEFAULT_MIXIN, MIN_MIXIN};
use crate::rpc::{RateLimit, RetryPolicy};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The YAML document could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A value is out of its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Durations as whole seconds.
pub mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Durations as whole milliseconds.
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Durations of the two contracts of a swap. The leg locked second must expire at least
/// `safety_margin` before the leg locked first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelockPolicy {
    #[serde(with = "secs")]
    pub first_leg: Duration,
    #[serde(with = "secs")]
    pub second_leg: Duration,
    #[serde(with = "secs")]
    pub safety_margin: Duration,
}

impl Default for TimelockPolicy {
    fn default() -> Self {
        Self {
            first_leg: Duration::from_secs(48 * 3600),
            second_leg: Duration::from_secs(24 * 3600),
            safety_margin: Duration::from_secs(6 * 3600),
        }
    }
}

/// Upper bounds of the coordinator waits. An expired wait sends the session to the refund path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Waiting for the counterparty to agree.
    #[serde(with = "secs")]
    pub negotiation: Duration,
    /// Waiting for a lock to reach the confirmation depth.
    #[serde(with = "secs")]
    pub lock_confirmation: Duration,
    /// Waiting for the secret to show up on chain.
    #[serde(with = "secs")]
    pub claim_observation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            negotiation: Duration::from_secs(300),
            lock_confirmation: Duration::from_secs(4 * 3600),
            claim_observation: Duration::from_secs(12 * 3600),
        }
    }
}

/// Amount limits of a supported pair, in atomic units of `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairLimits {
    pub from: Asset,
    pub to: Asset,
    #[serde(with = "string")]
    pub min: Amount,
    #[serde(with = "string")]
    pub max: Amount,
}

impl PairLimits {
    /// Limits given in thousandths of a `from` unit.
    pub fn milli(from: Asset, to: Asset, min: u128, max: u128) -> Self {
        Self {
            from,
            to,
            min: from.milli_units(min),
            max: from.milli_units(max),
        }
    }

    /// True when `amount` is within the inclusive limits.
    pub fn contains(&self, amount: Amount) -> bool {
        self.min <= amount && amount <= self.max
    }
}

/// Pairs supported out of the box.
pub fn default_pairs() -> Vec<PairLimits> {
    use Asset::*;

    let mut pairs = vec![PairLimits::milli(Xmr, Eth, 10, 1_000_000)];
    for stable in [Usdc, Usdt, Dai] {
        pairs.push(PairLimits::milli(Xmr, stable, 1_000, 50_000_000));
    }
    pairs.push(PairLimits::milli(Eth, Xmr, 1, 100_000));
    for stable in [Usdc, Usdt, Dai] {
        pairs.push(PairLimits::milli(Eth, stable, 1, 10_000_000));
    }
    for token in [Link, Uni] {
        pairs.push(PairLimits::milli(Eth, token, 1_000, 10_000_000));
    }
    for from in [Usdc, Usdt] {
        pairs.push(PairLimits::milli(from, Xmr, 1_000, 50_000_000));
        pairs.push(PairLimits::milli(from, Eth, 1_000, 50_000_000));
    }
    pairs.push(PairLimits::milli(Usdc, Dai, 1_000, 100_000_000));
    pairs.push(PairLimits::milli(Bnb, Xmr, 10, 500_000));
    pairs.push(PairLimits::milli(Matic, Xmr, 10_000, 50_000_000));
    pairs
}

/// Configuration of a coordinator and the sessions it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub timelocks: TimelockPolicy,
    /// Confirmation depth overrides, chains not listed use their default.
    pub confirmations: BTreeMap<Chain, u32>,
    pub retry: RetryPolicy,
    pub timeouts: Timeouts,
    /// Delay between two chain polls.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Decoys per ring.
    pub mixin: usize,
    pub rate_limit: RateLimit,
    /// Slippage accepted between the intent rate and the fresh quote, in basis points.
    pub default_slippage_bps: u32,
    pub pairs: Vec<PairLimits>,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            timelocks: TimelockPolicy::default(),
            confirmations: BTreeMap::new(),
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
            poll_interval: Duration::from_secs(30),
            mixin: DEFAULT_MIXIN,
            rate_limit: RateLimit::default(),
            default_slippage_bps: 100,
            pairs: default_pairs(),
        }
    }
}

impl SwapConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the configuration is consistent.
    pub fn validate(&self) -> Result<(), Error> {
        let timelocks = &self.timelocks;
        if timelocks.second_leg + timelocks.safety_margin > timelocks.first_leg {
            return Err(Error::Invalid(format!(
                "second leg timelock {:?} plus margin {:?} exceeds first leg {:?}",
                timelocks.second_leg, timelocks.safety_margin, timelocks.first_leg
            )));
        }
        if self.mixin < MIN_MIXIN {
            return Err(Error::Invalid(format!(
                "mixin {} below minimum {}",
                self.mixin, MIN_MIXIN
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Invalid("retry needs at least one attempt".into()));
        }
        if self.rate_limit.max_in_flight == 0 {
            return Err(Error::Invalid("rate limit allows no request".into()));
        }
        if self.default_slippage_bps > 10_000 {
            return Err(Error::Invalid(format!(
                "slippage {} bps above 100%",
                self.default_slippage_bps
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Invalid("poll interval must be positive".into()));
        }
        for pair in &self.pairs {
            if pair.from == pair.to || pair.min > pair.max {
                return Err(Error::Invalid(format!(
                    "invalid pair {}/{}",
                    pair.from, pair.to
                )));
            }
        }
        Ok(())
    }

    /// Confirmation depth required on `chain`.
    pub fn confirmations_for(&self, chain: Chain) -> u32 {
        self.confirmations
            .get(&chain)
            .copied()
            .unwrap_or_else(|| chain.default_confirmations())
    }

    /// Limits of the `from`/`to` pair, if supported.
    pub fn pair(&self, from: Asset, to: Asset) -> Option<&PairLimits> {
        self.pairs.iter().find(|p| p.from == from && p.to == to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SwapConfig::default();
        config.validate().unwrap();
        assert_eq!(config.mixin, 16);
        assert_eq!(config.timelocks.first_leg, Duration::from_secs(172_800));
        assert_eq!(config.timelocks.second_leg, Duration::from_secs(86_400));
        assert_eq!(config.confirmations_for(Chain::Monero), 10);
        assert_eq!(config.confirmations_for(Chain::Ethereum), 12);
    }

    #[test]
    fn default_pair_limits() {
        let config = SwapConfig::default();
        let xmr_eth = config.pair(Asset::Xmr, Asset::Eth).unwrap();
        assert_eq!(xmr_eth.min, 10_000_000_000);
        assert_eq!(xmr_eth.max, 1_000_000_000_000_000);
        assert!(xmr_eth.contains(xmr_eth.min));
        assert!(!xmr_eth.contains(xmr_eth.max + 1));
        assert!(config.pair(Asset::Eth, Asset::Xmr).is_some());
        assert!(config.pair(Asset::Dai, Asset::Usdc).is_none());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "
timelocks:
  first_leg: 7200
  second_leg: 3600
  safety_margin: 600
confirmations:
  Monero: 2
retry:
  max_attempts: 2
mixin: 11
";
        let config = SwapConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.timelocks.first_leg, Duration::from_secs(7200));
        assert_eq!(config.confirmations_for(Chain::Monero), 2);
        assert_eq!(config.confirmations_for(Chain::Polygon), 128);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.call_timeout, RetryPolicy::default().call_timeout);
        assert_eq!(config.mixin, 11);
        assert_eq!(config.pairs, default_pairs());
    }

    #[test]
    fn invalid_configurations() {
        let inverted = "timelocks:\n  first_leg: 3600\n  second_leg: 7200\n";
        assert!(matches!(
            SwapConfig::from_yaml(inverted),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            SwapConfig::from_yaml("mixin: 4\n"),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            SwapConfig::from_yaml("mixin: [\n"),
            Err(Error::Yaml(_))
        ));
        let pair = "pairs:\n  - from: XMR\n    to: ETH\n    min: \"10\"\n    max: \"1\"\n";
        assert!(SwapConfig::from_yaml(pair).is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = SwapConfig::default();
        config.confirmations.insert(Chain::Bsc, 3);
        let yaml = config.to_yaml().unwrap();
        assert_eq!(SwapConfig::from_yaml(&yaml).unwrap(), config);
    }
}
