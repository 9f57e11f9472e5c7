//! Outbound calls emitted by the ledger and the escrow.
//!
//! Components never touch each other's state. An entrypoint returns the
//! operations it wants performed and the host executes them in order, with
//! the emitting contract as the sender.

use crate::types::{Address, Amount, RequestId, ReservationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const RANDOMNESS_CALLBACK: &str = "receive_randomness";

/// Which side of the round a stake lands on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeSide {
    /// Player side, relayed by the ledger out of the player's account.
    Player {
        player: Address,
        prediction: bool,
        reservation: ReservationId,
    },
    /// Player side, staked by the designated player with their own value.
    Direct { prediction: bool },
    /// Counter side, funded from the ledger's house balance.
    House,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub id: RequestId,
    pub callback: Address,
    pub entrypoint: String,
    pub spec_id: String,
    pub requested_at: DateTime<Utc>,
}

impl RandomnessRequest {
    pub fn new(callback: Address, spec_id: impl Into<String>, requested_at: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            callback,
            entrypoint: RANDOMNESS_CALLBACK.to_string(),
            spec_id: spec_id.into(),
            requested_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Plain value transfer, no entrypoint is invoked.
    Transfer { to: Address, amount: Amount },

    /// `place_bet` on the escrow, `amount` attached as the stake.
    PlaceBet {
        escrow: Address,
        amount: Amount,
        side: StakeSide,
    },

    /// `set_player` on the escrow.
    SetPlayer { escrow: Address, player: Address },

    /// `finish_game` on the ledger, `amount` attached (the round's pot).
    FinishGame {
        ledger: Address,
        amount: Amount,
        player: Address,
        refund: Amount,
    },

    /// Hand a request to the randomness oracle.
    RequestRandomness(RandomnessRequest),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Transfer { .. } => "transfer",
            Operation::PlaceBet { .. } => "place_bet",
            Operation::SetPlayer { .. } => "set_player",
            Operation::FinishGame { .. } => "finish_game",
            Operation::RequestRandomness(_) => "request_randomness",
        }
    }
}
