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

//! States of a swap session and the transitions between them.

use std::io;
use std::str::FromStr;

use crate::consensus::{self, Decodable, Encodable};
use crate::swap::Error;

/// State of a swap session.
#[derive(
    Display, Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(Debug)]
pub enum SwapState {
    /// Intent accepted, nothing negotiated.
    Idle,
    /// Waiting for a counterparty to agree.
    Negotiating,
    /// Secret generated, legs built, nothing locked yet.
    CreatingHtlc,
    /// The `from` leg is locked, waiting for its confirmations.
    LockingFrom,
    /// The `to` leg is locked, waiting for its confirmations.
    LockingTo,
    /// Claims in progress.
    Claiming,
    /// Both legs claimed.
    Completed,
    /// Every locked leg refunded.
    Refunded,
    /// Stopped on an unrecoverable error.
    Failed,
}

impl SwapState {
    /// Terminal states accept no transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapState::Completed | SwapState::Refunded | SwapState::Failed
        )
    }

    /// True once funds may be locked on chain.
    pub fn has_locked_funds(&self) -> bool {
        matches!(
            self,
            SwapState::LockingFrom | SwapState::LockingTo | SwapState::Claiming
        )
    }

    /// Next state after applying `transition`, or [`Error::InvalidTransition`].
    pub fn apply(self, transition: Transition) -> Result<SwapState, Error> {
        use SwapState::*;
        use Transition::*;

        let next = match (self, transition) {
            (Idle, Negotiate) => Negotiating,
            (Negotiating, Agree) => CreatingHtlc,
            (Negotiating, Reject) => Idle,
            (Negotiating | CreatingHtlc, Cancel) => Idle,
            (CreatingHtlc, LockFrom) => LockingFrom,
            (LockingFrom, LockTo) => LockingTo,
            (LockingTo, Claim) => Claiming,
            (Claiming, Complete) => Completed,
            (state @ (LockingFrom | LockingTo | Claiming), Abandon) => state,
            (CreatingHtlc | LockingFrom | LockingTo | Claiming, Refund) => Refunded,
            (Idle | Negotiating | CreatingHtlc | LockingFrom | LockingTo | Claiming, Fail) => Failed,
            (
                Idle | Negotiating | CreatingHtlc | LockingFrom | LockingTo | Claiming | Completed
                | Refunded | Failed,
                Negotiate | Agree | Reject | Cancel | LockFrom | LockTo | Claim | Complete
                | Abandon | Refund | Fail,
            ) => {
                return Err(Error::InvalidTransition {
                    from: self,
                    transition,
                })
            }
        };
        Ok(next)
    }
}

impl Encodable for SwapState {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let tag: u8 = match self {
            SwapState::Idle => 0x01,
            SwapState::Negotiating => 0x02,
            SwapState::CreatingHtlc => 0x03,
            SwapState::LockingFrom => 0x04,
            SwapState::LockingTo => 0x05,
            SwapState::Claiming => 0x06,
            SwapState::Completed => 0x07,
            SwapState::Refunded => 0x08,
            SwapState::Failed => 0x09,
        };
        tag.consensus_encode(writer)
    }
}

impl Decodable for SwapState {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match u8::consensus_decode(d)? {
            0x01 => Ok(SwapState::Idle),
            0x02 => Ok(SwapState::Negotiating),
            0x03 => Ok(SwapState::CreatingHtlc),
            0x04 => Ok(SwapState::LockingFrom),
            0x05 => Ok(SwapState::LockingTo),
            0x06 => Ok(SwapState::Claiming),
            0x07 => Ok(SwapState::Completed),
            0x08 => Ok(SwapState::Refunded),
            0x09 => Ok(SwapState::Failed),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(SwapState);

impl FromStr for SwapState {
    type Err = consensus::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(SwapState::Idle),
            "Negotiating" => Ok(SwapState::Negotiating),
            "CreatingHtlc" => Ok(SwapState::CreatingHtlc),
            "LockingFrom" => Ok(SwapState::LockingFrom),
            "LockingTo" => Ok(SwapState::LockingTo),
            "Claiming" => Ok(SwapState::Claiming),
            "Completed" => Ok(SwapState::Completed),
            "Refunded" => Ok(SwapState::Refunded),
            "Failed" => Ok(SwapState::Failed),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

/// Events moving a session from one state to another.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum Transition {
    /// Start negotiating a validated intent.
    Negotiate,
    /// The counterparty agreed.
    Agree,
    /// The counterparty refused, back to idle.
    Reject,
    /// Give up before anything is locked.
    Cancel,
    /// The `from` leg was locked.
    LockFrom,
    /// The `to` leg was locked.
    LockTo,
    /// Both locks are confirmed, start claiming.
    Claim,
    /// Both legs claimed.
    Complete,
    /// Stop driving the swap forward and wait for the refund.
    Abandon,
    /// Every locked leg was refunded.
    Refund,
    /// Unrecoverable error.
    Fail,
}
