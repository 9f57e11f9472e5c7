use coinflip_core::{Address, Amount, Operation, RandomnessRequest, StakeSide};
use coinflip_escrow::Settlement;
use serde::{Deserialize, Serialize};

/// Ledger entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCall {
    Deposit,
    Withdraw,
    Bet {
        amount: Amount,
        prediction: bool,
        observed_balance: Amount,
    },
    FinishGame {
        player: Address,
        refund: Amount,
    },
    OwnerWithdraw {
        destination: Address,
        amount: Amount,
    },
    CounterStake {
        amount: Amount,
    },
    DesignatePlayer(Address),
    SetEscrow(Address),
    SetOracle(Address),
}

/// Escrow entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowCall {
    PlaceBet(StakeSide),
    ReceiveRandomness { value: u128 },
    PerformPayout,
    SetPlayer(Address),
    CancelRequest,
}

/// An entrypoint on either contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    Ledger(LedgerCall),
    Escrow(EscrowCall),
}

impl From<LedgerCall> for Call {
    fn from(call: LedgerCall) -> Self {
        Call::Ledger(call)
    }
}

impl From<EscrowCall> for Call {
    fn from(call: EscrowCall) -> Self {
        Call::Escrow(call)
    }
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::Ledger(call) => match call {
                LedgerCall::Deposit => "deposit",
                LedgerCall::Withdraw => "withdraw",
                LedgerCall::Bet { .. } => "bet",
                LedgerCall::FinishGame { .. } => "finish_game",
                LedgerCall::OwnerWithdraw { .. } => "owner_withdraw",
                LedgerCall::CounterStake { .. } => "counter_stake",
                LedgerCall::DesignatePlayer(_) => "designate_player",
                LedgerCall::SetEscrow(_) => "set_escrow",
                LedgerCall::SetOracle(_) => "set_oracle",
            },
            Call::Escrow(call) => match call {
                EscrowCall::PlaceBet(_) => "place_bet",
                EscrowCall::ReceiveRandomness { .. } => "receive_randomness",
                EscrowCall::PerformPayout => "perform_payout",
                EscrowCall::SetPlayer(_) => "set_player",
                EscrowCall::CancelRequest => "cancel_request",
            },
        }
    }
}

/// Something observable that happened while executing a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Transferred {
        from: Address,
        to: Address,
        amount: Amount,
    },
    RandomnessRequested(RandomnessRequest),
    Settled(Settlement),
    /// The ledger refused the payout credit; the round stays payable.
    PayoutDeferred { player: Address, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct Receipt {
    pub events: Vec<Event>,
    pub operations: Vec<Operation>,
}

impl Receipt {
    pub fn settlement(&self) -> Option<&Settlement> {
        self.events.iter().find_map(|event| match event {
            Event::Settled(settlement) => Some(settlement),
            _ => None,
        })
    }

    pub fn payout_deferred(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match event {
            Event::PayoutDeferred { reason, .. } => Some(reason.as_str()),
            _ => None,
        })
    }

    pub fn randomness_requested(&self) -> Option<&RandomnessRequest> {
        self.events.iter().find_map(|event| match event {
            Event::RandomnessRequested(request) => Some(request),
            _ => None,
        })
    }
}
