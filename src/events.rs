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

//! Lifecycle events of swap sessions, published on a broadcast channel. Publishing never fails a
//! session: events without subscribers are dropped.

use tokio::sync::broadcast;
use tracing::debug;

use crate::blockchain::{Asset, Chain, TxId};
use crate::htlc::ContractId;
use crate::swap::{Leg, SwapId, SwapState};

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// An event in the life of a swap session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwapEvent {
    SessionCreated {
        swap_id: SwapId,
        from: Asset,
        to: Asset,
    },
    LegLocked {
        swap_id: SwapId,
        leg: Leg,
        chain: Chain,
        contract: ContractId,
        tx: TxId,
    },
    LegClaimed {
        swap_id: SwapId,
        leg: Leg,
        chain: Chain,
        tx: TxId,
    },
    LegRefunded {
        swap_id: SwapId,
        leg: Leg,
        chain: Chain,
        tx: TxId,
    },
    SessionCompleted {
        swap_id: SwapId,
    },
    SessionRefunded {
        swap_id: SwapId,
    },
    SessionFailed {
        swap_id: SwapId,
        last_confirmed_state: SwapState,
        recoverable: bool,
        reason: String,
    },
    SessionCancelled {
        swap_id: SwapId,
    },
}

impl SwapEvent {
    /// The session the event belongs to.
    pub fn swap_id(&self) -> SwapId {
        match self {
            SwapEvent::SessionCreated { swap_id, .. }
            | SwapEvent::LegLocked { swap_id, .. }
            | SwapEvent::LegClaimed { swap_id, .. }
            | SwapEvent::LegRefunded { swap_id, .. }
            | SwapEvent::SessionCompleted { swap_id }
            | SwapEvent::SessionRefunded { swap_id }
            | SwapEvent::SessionFailed { swap_id, .. }
            | SwapEvent::SessionCancelled { swap_id } => *swap_id,
        }
    }
}

/// Broadcasts [`SwapEvent`]s to every subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SwapEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.sender.subscribe()
    }

    /// Publish `event`, dropped when nobody listens.
    pub fn emit(&self, event: SwapEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!(swap_id = %event.swap_id(), "no subscriber for {:?}", event);
        }
    }
}
