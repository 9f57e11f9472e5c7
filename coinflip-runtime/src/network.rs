use crate::call::{Call, EscrowCall, Event, LedgerCall, Receipt};
use crate::error::{Result, RuntimeError};
use chrono::{DateTime, Duration, Utc};
use coinflip_core::{
    Address, Amount, BalanceLedger, BetLimitSource, CallContext, LedgerConfig, Operation,
    RandomnessRequest, RequestId, StakeSide, WagerError,
};
use coinflip_escrow::{EscrowConfig, EscrowRound, DEFAULT_HOUSE_FEE_PERCENT, DEFAULT_SPEC_ID};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type SharedNetwork = Arc<Mutex<Network>>;

/// Addresses and policies for a fresh deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub owner: Address,
    pub oracle: Address,
    pub ledger: Address,
    pub escrow: Address,
    pub bet_limit: BetLimitSource,
    pub fee_percent: u64,
    pub spec_id: String,
    pub request_timeout_secs: Option<u64>,
}

impl NetworkConfig {
    pub fn new(owner: Address, oracle: Address) -> Result<Self> {
        Ok(Self {
            owner,
            oracle,
            ledger: Address::parse("ledger")?,
            escrow: Address::parse("escrow")?,
            bet_limit: BetLimitSource::default(),
            fee_percent: DEFAULT_HOUSE_FEE_PERCENT,
            spec_id: DEFAULT_SPEC_ID.to_string(),
            request_timeout_secs: None,
        })
    }

    pub fn with_bet_limit(mut self, bet_limit: BetLimitSource) -> Self {
        self.bet_limit = bet_limit;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }
}

/// In-memory host for the ledger and the escrow.
///
/// Tracks native balances, moves attached value, and executes the operations
/// each entrypoint emits depth-first with the emitting contract as sender.
/// Every invocation is atomic: if the entrypoint or any operation it emitted
/// fails, contracts, balances and the receipt are restored to where they were
/// before the invocation started.
///
/// The two cross-contract actions are run as sagas on top of that: a rejected
/// relayed bet is refunded into the player's account, and a refused payout
/// credit leaves the round payable so `perform_payout` can be retried.
#[derive(Debug, Serialize, Deserialize)]
pub struct Network {
    ledger: BalanceLedger,
    escrow: EscrowRound,
    balances: BTreeMap<Address, Amount>,
    requests: VecDeque<RandomnessRequest>,
    time_offset_secs: i64,
    #[serde(skip)]
    oracle_tx: Option<mpsc::UnboundedSender<RandomnessRequest>>,
}

/// State captured before an invocation, restored if it fails.
struct Checkpoint {
    ledger: BalanceLedger,
    escrow: EscrowRound,
    balances: BTreeMap<Address, Amount>,
    requests: VecDeque<RandomnessRequest>,
    events: usize,
    operations: usize,
}

impl Network {
    /// Deploy and wire both contracts. The ledger trusts the escrow as the
    /// forwarder of oracle outcomes.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let ledger_config = LedgerConfig::new(config.owner.clone(), config.escrow.clone())
            .with_escrow(config.escrow.clone())
            .with_bet_limit(config.bet_limit);
        let ledger = BalanceLedger::new(config.ledger.clone(), ledger_config)?;

        let mut escrow_config = EscrowConfig::new(config.ledger.clone(), config.oracle.clone());
        escrow_config.spec_id = config.spec_id.clone();
        escrow_config.fee_percent = config.fee_percent;
        escrow_config.request_timeout_secs = config.request_timeout_secs;
        let escrow = EscrowRound::new(config.escrow.clone(), escrow_config)?;

        Self::from_parts(ledger, escrow)
    }

    /// Host already constructed contracts, wired however they are.
    pub fn from_parts(ledger: BalanceLedger, escrow: EscrowRound) -> Result<Self> {
        if ledger.address() == escrow.address() {
            return Err(WagerError::config("Ledger and escrow must have distinct addresses").into());
        }

        tracing::info!(
            "Network deployed: ledger {}, escrow {}, oracle {}",
            ledger.address(),
            escrow.address(),
            escrow.config().oracle
        );

        Ok(Self {
            ledger,
            escrow,
            balances: BTreeMap::new(),
            requests: VecDeque::new(),
            time_offset_secs: 0,
            oracle_tx: None,
        })
    }

    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    pub fn escrow(&self) -> &EscrowRound {
        &self.escrow
    }

    pub fn oracle_address(&self) -> &Address {
        &self.escrow.config().oracle
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or_default()
    }

    pub fn balances(&self) -> impl Iterator<Item = (&Address, Amount)> {
        self.balances.iter().map(|(address, amount)| (address, *amount))
    }

    /// Sum of every native balance. Constant across calls.
    pub fn total_value(&self) -> Result<Amount> {
        self.balances
            .values()
            .try_fold(Amount::ZERO, |total, amount| total.try_add(*amount))
            .map_err(Into::into)
    }

    /// Genesis value for `address`.
    pub fn fund(&mut self, address: &Address, amount: Amount) -> Result<Amount> {
        let balance = self.balance_of(address).try_add(amount)?;
        self.balances.insert(address.clone(), balance);

        tracing::info!("Funded {} with {}, balance {}", address, amount, balance);
        Ok(balance)
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.time_offset_secs)
    }

    pub fn advance_time(&mut self, by: Duration) {
        self.time_offset_secs = self.time_offset_secs.saturating_add(by.num_seconds());
        tracing::debug!("Clock advanced by {}s", by.num_seconds());
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &RandomnessRequest> {
        self.requests.iter()
    }

    /// Route randomness requests to a channel; queued ones are replayed.
    pub fn attach_oracle(&mut self) -> mpsc::UnboundedReceiver<RandomnessRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        for request in &self.requests {
            let _ = tx.send(request.clone());
        }
        self.oracle_tx = Some(tx);
        rx
    }

    pub fn detach_oracle(&mut self) {
        self.oracle_tx = None;
    }

    pub fn call_ledger(
        &mut self,
        sender: &Address,
        attached: Amount,
        call: LedgerCall,
    ) -> Result<Receipt> {
        let target = self.ledger.address().clone();
        self.call(sender, &target, attached, call)
    }

    pub fn call_escrow(
        &mut self,
        sender: &Address,
        attached: Amount,
        call: EscrowCall,
    ) -> Result<Receipt> {
        let target = self.escrow.address().clone();
        self.call(sender, &target, attached, call)
    }

    /// Run one top-level call to completion.
    pub fn call(
        &mut self,
        sender: &Address,
        target: &Address,
        attached: Amount,
        call: impl Into<Call>,
    ) -> Result<Receipt> {
        let call = call.into();
        let retrying_payout = matches!(call, Call::Escrow(EscrowCall::PerformPayout));

        tracing::debug!("{} -> {}::{} ({})", sender, target, call.name(), attached);

        let mut receipt = Receipt::default();
        let result = self.invoke(sender, target, attached, call, &mut receipt);
        self.sync_requests();
        result?;
        self.notify_oracle(&receipt);

        if retrying_payout {
            if let Some(reason) = receipt.payout_deferred() {
                return Err(RuntimeError::PayoutFailed(reason.to_string()));
            }
        }

        Ok(receipt)
    }

    /// Deliver the oracle's answer for `request_id`.
    pub fn fulfill(&mut self, request_id: RequestId, value: u128) -> Result<Receipt> {
        match self.escrow.pending_request() {
            Some(request) if request.id == request_id => {}
            _ => return Err(RuntimeError::UnknownRequest(request_id)),
        }

        let oracle = self.oracle_address().clone();
        self.call_escrow(&oracle, Amount::ZERO, EscrowCall::ReceiveRandomness { value })
    }

    /// Run one entrypoint and everything it emits, or nothing at all.
    fn invoke(
        &mut self,
        sender: &Address,
        target: &Address,
        attached: Amount,
        call: Call,
        receipt: &mut Receipt,
    ) -> Result<()> {
        let checkpoint = self.checkpoint(receipt);
        let name = call.name();

        let result = self.execute(sender, target, attached, call, receipt);
        if let Err(e) = &result {
            tracing::debug!("{}::{} rejected, rolling back: {}", target, name, e);
            self.restore(checkpoint, receipt);
        }
        result
    }

    fn execute(
        &mut self,
        sender: &Address,
        target: &Address,
        attached: Amount,
        call: Call,
        receipt: &mut Receipt,
    ) -> Result<()> {
        self.resolve(target, &call)?;
        self.move_value(sender, target, attached)?;

        let ctx = CallContext::new(sender.clone(), attached, self.balance_of(target), self.now());
        for op in self.dispatch(&ctx, call)? {
            self.apply(target, op, receipt)?;
        }
        Ok(())
    }

    fn checkpoint(&self, receipt: &Receipt) -> Checkpoint {
        Checkpoint {
            ledger: self.ledger.clone(),
            escrow: self.escrow.clone(),
            balances: self.balances.clone(),
            requests: self.requests.clone(),
            events: receipt.events.len(),
            operations: receipt.operations.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint, receipt: &mut Receipt) {
        self.ledger = checkpoint.ledger;
        self.escrow = checkpoint.escrow;
        self.balances = checkpoint.balances;
        self.requests = checkpoint.requests;
        receipt.events.truncate(checkpoint.events);
        receipt.operations.truncate(checkpoint.operations);
    }

    fn resolve(&self, target: &Address, call: &Call) -> Result<()> {
        let expected = match call {
            Call::Ledger(_) => self.ledger.address(),
            Call::Escrow(_) => self.escrow.address(),
        };

        if target != expected {
            return Err(RuntimeError::UnknownContract(target.clone()));
        }
        Ok(())
    }

    fn dispatch(&mut self, ctx: &CallContext, call: Call) -> coinflip_core::Result<Vec<Operation>> {
        match call {
            Call::Ledger(call) => match call {
                LedgerCall::Deposit => self.ledger.deposit(ctx),
                LedgerCall::Withdraw => self.ledger.withdraw(ctx),
                LedgerCall::Bet {
                    amount,
                    prediction,
                    observed_balance,
                } => self.ledger.bet(ctx, amount, prediction, observed_balance),
                LedgerCall::FinishGame { player, refund } => {
                    self.ledger.finish_game(ctx, &player, refund)
                }
                LedgerCall::OwnerWithdraw {
                    destination,
                    amount,
                } => self.ledger.owner_withdraw(ctx, destination, amount),
                LedgerCall::CounterStake { amount } => self.ledger.counter_stake(ctx, amount),
                LedgerCall::DesignatePlayer(player) => self.ledger.designate_player(ctx, player),
                LedgerCall::SetEscrow(escrow) => self.ledger.set_escrow(ctx, escrow),
                LedgerCall::SetOracle(oracle) => self.ledger.set_oracle(ctx, oracle),
            },
            Call::Escrow(call) => match call {
                EscrowCall::PlaceBet(side) => self.escrow.place_bet(ctx, side),
                EscrowCall::ReceiveRandomness { value } => {
                    self.escrow.receive_randomness(ctx, value)
                }
                EscrowCall::PerformPayout => self.escrow.perform_payout(ctx),
                EscrowCall::SetPlayer(player) => self.escrow.set_player(ctx, player),
                EscrowCall::CancelRequest => self.escrow.cancel_request(ctx),
            },
        }
    }

    fn apply(&mut self, emitter: &Address, op: Operation, receipt: &mut Receipt) -> Result<()> {
        tracing::trace!("{} emitted {}", emitter, op.name());
        receipt.operations.push(op.clone());

        match op {
            Operation::Transfer { to, amount } => {
                self.move_value(emitter, &to, amount)?;
                receipt.events.push(Event::Transferred {
                    from: emitter.clone(),
                    to,
                    amount,
                });
                Ok(())
            }

            Operation::PlaceBet {
                escrow,
                amount,
                side,
            } => {
                let reservation = match &side {
                    StakeSide::Player { reservation, .. } => Some(*reservation),
                    _ => None,
                };
                let call = Call::Escrow(EscrowCall::PlaceBet(side));
                let result = self.invoke(emitter, &escrow, amount, call, receipt);

                let Some(reservation) = reservation else {
                    return result;
                };

                match result {
                    Ok(()) => {
                        self.ledger.confirm_bet(reservation)?;
                        Ok(())
                    }
                    Err(e) => {
                        tracing::warn!("Escrow rejected bet {}: {}", reservation, e);
                        self.ledger.refund_bet(reservation)?;
                        Err(e)
                    }
                }
            }

            Operation::SetPlayer { escrow, player } => {
                let call = Call::Escrow(EscrowCall::SetPlayer(player));
                self.invoke(emitter, &escrow, Amount::ZERO, call, receipt)
            }

            Operation::FinishGame {
                ledger,
                amount,
                player,
                refund,
            } => {
                let call = Call::Ledger(LedgerCall::FinishGame {
                    player: player.clone(),
                    refund,
                });
                let result = self.invoke(emitter, &ledger, amount, call, receipt);

                if emitter != self.escrow.address() {
                    return result;
                }

                match result {
                    Ok(()) => {
                        let settlement = self.escrow.complete_payout()?;
                        receipt.events.push(Event::Settled(settlement));
                    }
                    Err(e) => {
                        tracing::warn!("Payout for {} deferred: {}", player, e);
                        receipt.events.push(Event::PayoutDeferred {
                            player,
                            reason: e.to_string(),
                        });
                    }
                }
                Ok(())
            }

            Operation::RequestRandomness(request) => {
                tracing::info!("Randomness request {} queued for the oracle", request.id);
                self.requests.push_back(request.clone());
                receipt.events.push(Event::RandomnessRequested(request));
                Ok(())
            }
        }
    }

    fn move_value(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if amount.is_zero() || from == to {
            return Ok(());
        }

        let available = self.balance_of(from);
        let remaining =
            available
                .checked_sub(amount)
                .ok_or_else(|| RuntimeError::InsufficientFunds {
                    address: from.clone(),
                    need: amount.to_mutez(),
                    available: available.to_mutez(),
                })?;
        let credited = self.balance_of(to).try_add(amount)?;

        self.balances.insert(from.clone(), remaining);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }

    /// Hand the requests a committed call issued to the attached oracle.
    fn notify_oracle(&mut self, receipt: &Receipt) {
        let Some(tx) = &self.oracle_tx else {
            return;
        };

        let mut closed = false;
        for event in &receipt.events {
            if let Event::RandomnessRequested(request) = event {
                if tx.send(request.clone()).is_err() {
                    tracing::warn!("Oracle channel closed, request {} stays queued", request.id);
                    closed = true;
                }
            }
        }
        if closed {
            self.oracle_tx = None;
        }
    }

    /// Only the live request stays queued.
    fn sync_requests(&mut self) {
        let live = self.escrow.pending_request().map(|request| request.id);
        self.requests.retain(|request| Some(request.id) == live);
    }
}
