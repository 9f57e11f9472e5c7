use coinflip_core::{Address, Amount, RandomnessRequest, ReservationId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a player-side stake came from, and so where it goes if returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeSource {
    /// The designated player attached their own value.
    Direct,
    /// The ledger relayed it out of the player's account.
    Ledger { reservation: ReservationId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStake {
    pub player: Address,
    pub amount: Amount,
    pub prediction: bool,
    pub source: StakeSource,
}

/// The one side recorded while the round waits for the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Staked {
    Player(PlayerStake),
    House(Amount),
}

/// Singleton round held by the escrow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    #[default]
    Empty,
    OneSideStaked(Staked),
    RequestPending {
        player: PlayerStake,
        house: Amount,
        request: RandomnessRequest,
    },
    RandomnessReceived {
        player: PlayerStake,
        house: Amount,
        value: u128,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Empty,
    OneSideStaked,
    RequestPending,
    RandomnessReceived,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundPhase::Empty => "Empty",
            RoundPhase::OneSideStaked => "OneSideStaked",
            RoundPhase::RequestPending => "RequestPending",
            RoundPhase::RandomnessReceived => "RandomnessReceived",
        };
        f.write_str(name)
    }
}

impl RoundState {
    pub fn phase(&self) -> RoundPhase {
        match self {
            RoundState::Empty => RoundPhase::Empty,
            RoundState::OneSideStaked(_) => RoundPhase::OneSideStaked,
            RoundState::RequestPending { .. } => RoundPhase::RequestPending,
            RoundState::RandomnessReceived { .. } => RoundPhase::RandomnessReceived,
        }
    }

    pub fn player_stake(&self) -> Option<&PlayerStake> {
        match self {
            RoundState::Empty | RoundState::OneSideStaked(Staked::House(_)) => None,
            RoundState::OneSideStaked(Staked::Player(stake))
            | RoundState::RequestPending { player: stake, .. }
            | RoundState::RandomnessReceived { player: stake, .. } => Some(stake),
        }
    }

    pub fn house_stake(&self) -> Amount {
        match self {
            RoundState::Empty | RoundState::OneSideStaked(Staked::Player(_)) => Amount::ZERO,
            RoundState::OneSideStaked(Staked::House(amount)) => *amount,
            RoundState::RequestPending { house, .. }
            | RoundState::RandomnessReceived { house, .. } => *house,
        }
    }

    pub fn request(&self) -> Option<&RandomnessRequest> {
        match self {
            RoundState::RequestPending { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn random_value(&self) -> Option<u128> {
        match self {
            RoundState::RandomnessReceived { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Value the escrow holds on behalf of this round.
    pub fn staked_total(&self) -> Amount {
        let player = self
            .player_stake()
            .map(|stake| stake.amount)
            .unwrap_or_default();
        player
            .checked_add(self.house_stake())
            .unwrap_or(Amount::from_mutez(u64::MAX))
    }
}
