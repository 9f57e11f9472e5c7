use crate::config::EscrowConfig;
use crate::payout::Settlement;
use crate::round::{PlayerStake, RoundPhase, RoundState, StakeSource, Staked};
use coinflip_core::{
    Address, Amount, CallContext, Operation, RandomnessRequest, Result, StakeSide, WagerError,
};
use serde::{Deserialize, Serialize};

/// Holds the one in-flight round and adjudicates it.
///
/// Transitions: `Empty -> OneSideStaked -> RequestPending ->
/// RandomnessReceived -> Empty`. Every entrypoint validates before it
/// mutates, so a rejected call leaves the round exactly as it was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRound {
    address: Address,
    config: EscrowConfig,
    player: Option<Address>,
    state: RoundState,
}

impl EscrowRound {
    pub fn new(address: Address, config: EscrowConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            address,
            config,
            player: None,
            state: RoundState::Empty,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn designated_player(&self) -> Option<&Address> {
        self.player.as_ref()
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase()
    }

    pub fn pending_request(&self) -> Option<&RandomnessRequest> {
        self.state.request()
    }

    pub fn set_player(&mut self, ctx: &CallContext, player: Address) -> Result<Vec<Operation>> {
        if ctx.sender != self.config.ledger {
            return Err(WagerError::unauthorized(&ctx.sender, "set_player"));
        }
        ctx.reject_value("set_player")?;

        if let Some(stake) = self.state.player_stake() {
            return Err(WagerError::invalid_state(format!(
                "Player side already staked by {}",
                stake.player
            )));
        }

        tracing::info!("Designated player set to {}", player);
        self.player = Some(player);
        Ok(Vec::new())
    }

    pub fn place_bet(&mut self, ctx: &CallContext, side: StakeSide) -> Result<Vec<Operation>> {
        let incoming = self.authorize_stake(ctx, side)?;

        if ctx.amount.is_zero() {
            return Err(WagerError::invalid_amount("Bet must be greater than 0"));
        }

        let mut ops = Vec::new();
        let next = match (&self.state, incoming) {
            (RoundState::Empty, incoming) => RoundState::OneSideStaked(incoming),

            (RoundState::OneSideStaked(Staked::Player(old)), Staked::Player(new)) => {
                ops.push(self.return_player_stake(old));
                RoundState::OneSideStaked(Staked::Player(new))
            }
            (RoundState::OneSideStaked(Staked::House(old)), Staked::House(new)) => {
                ops.push(self.return_house_stake(*old));
                RoundState::OneSideStaked(Staked::House(new))
            }

            (RoundState::OneSideStaked(Staked::Player(player)), Staked::House(house)) => {
                self.request_randomness(ctx, player.clone(), house, &mut ops)
            }
            (RoundState::OneSideStaked(Staked::House(house)), Staked::Player(player)) => {
                self.request_randomness(ctx, player, *house, &mut ops)
            }

            (state @ RoundState::RequestPending { .. }, _)
            | (state @ RoundState::RandomnessReceived { .. }, _) => {
                return Err(WagerError::invalid_state(format!(
                    "Round in progress ({}), no stakes accepted until it settles",
                    state.phase()
                )));
            }
        };

        if let Some(stake) = next.player_stake() {
            self.player = Some(stake.player.clone());
        }
        self.state = next;

        tracing::info!(
            "Stake of {} from {} accepted, round is {}",
            ctx.amount,
            ctx.sender,
            self.state.phase()
        );
        Ok(ops)
    }

    fn authorize_stake(&self, ctx: &CallContext, side: StakeSide) -> Result<Staked> {
        match side {
            StakeSide::Direct { prediction } => {
                if self.player.as_ref() != Some(&ctx.sender) {
                    return Err(WagerError::unauthorized(&ctx.sender, "place_bet"));
                }
                Ok(Staked::Player(PlayerStake {
                    player: ctx.sender.clone(),
                    amount: ctx.amount,
                    prediction,
                    source: StakeSource::Direct,
                }))
            }
            StakeSide::Player {
                player,
                prediction,
                reservation,
            } => {
                if ctx.sender != self.config.ledger {
                    return Err(WagerError::unauthorized(&ctx.sender, "place_bet"));
                }
                Ok(Staked::Player(PlayerStake {
                    player,
                    amount: ctx.amount,
                    prediction,
                    source: StakeSource::Ledger { reservation },
                }))
            }
            StakeSide::House => {
                if ctx.sender != self.config.ledger {
                    return Err(WagerError::unauthorized(&ctx.sender, "place_bet"));
                }
                Ok(Staked::House(ctx.amount))
            }
        }
    }

    fn request_randomness(
        &self,
        ctx: &CallContext,
        player: PlayerStake,
        house: Amount,
        ops: &mut Vec<Operation>,
    ) -> RoundState {
        let request = RandomnessRequest::new(self.address.clone(), &self.config.spec_id, ctx.now);

        tracing::info!(
            "Both sides staked ({} vs {}), requesting randomness {}",
            player.amount,
            house,
            request.id
        );

        ops.push(Operation::RequestRandomness(request.clone()));
        RoundState::RequestPending {
            player,
            house,
            request,
        }
    }

    fn return_player_stake(&self, stake: &PlayerStake) -> Operation {
        tracing::warn!(
            "Player stake of {} from {} displaced, returning it",
            stake.amount,
            stake.player
        );
        Operation::Transfer {
            to: stake.player.clone(),
            amount: stake.amount,
        }
    }

    fn return_house_stake(&self, amount: Amount) -> Operation {
        tracing::warn!("House stake of {} displaced, returning it", amount);
        Operation::Transfer {
            to: self.config.ledger.clone(),
            amount,
        }
    }

    pub fn receive_randomness(&mut self, ctx: &CallContext, value: u128) -> Result<Vec<Operation>> {
        if ctx.sender != self.config.oracle {
            return Err(WagerError::unauthorized(&ctx.sender, "receive_randomness"));
        }
        ctx.reject_value("receive_randomness")?;

        let (player, house) = match &self.state {
            RoundState::RequestPending { player, house, .. } => (player.clone(), *house),
            _ => return Err(WagerError::RandomnessNotRequested),
        };

        let settlement = Settlement::compute(&player, house, value, self.config.fee_percent)?;
        let ops = vec![self.finish_game(&settlement)];

        self.state = RoundState::RandomnessReceived {
            player,
            house,
            value,
        };

        tracing::info!(
            "Randomness received: {} ({} {}), refund {}",
            value,
            settlement.player,
            if settlement.won { "won" } else { "lost" },
            settlement.refund
        );
        Ok(ops)
    }

    /// Emit the ledger credit for a round whose random value is known.
    ///
    /// The round is not reset here: the host calls
    /// [`complete_payout`](Self::complete_payout) once the ledger accepted
    /// the credit. Until then the call can be repeated.
    pub fn perform_payout(&self, ctx: &CallContext) -> Result<Vec<Operation>> {
        ctx.reject_value("perform_payout")?;
        let settlement = self.settlement()?;

        tracing::info!(
            "Payout for {} requested by {}: {} ({}), refund {}",
            settlement.player,
            ctx.sender,
            settlement.value,
            if settlement.won { "won" } else { "lost" },
            settlement.refund
        );

        Ok(vec![self.finish_game(&settlement)])
    }

    fn finish_game(&self, settlement: &Settlement) -> Operation {
        Operation::FinishGame {
            ledger: self.config.ledger.clone(),
            amount: settlement.pot,
            player: settlement.player.clone(),
            refund: settlement.refund,
        }
    }

    pub fn settlement(&self) -> Result<Settlement> {
        match &self.state {
            RoundState::RandomnessReceived {
                player,
                house,
                value,
            } => Settlement::compute(player, *house, *value, self.config.fee_percent),
            state => Err(WagerError::invalid_state(format!(
                "No random value to pay out, round is {}",
                state.phase()
            ))),
        }
    }

    /// The ledger credited the payout; reset for the next round.
    pub fn complete_payout(&mut self) -> Result<Settlement> {
        let settlement = self.settlement()?;
        self.state = RoundState::Empty;

        tracing::info!("Round settled for {}, escrow reset", settlement.player);
        Ok(settlement)
    }

    /// Give up on an unanswered request once the configured timeout passed.
    pub fn cancel_request(&mut self, ctx: &CallContext) -> Result<Vec<Operation>> {
        ctx.reject_value("cancel_request")?;
        let timeout = self
            .config
            .request_timeout()?
            .ok_or_else(|| WagerError::invalid_state("Request timeout is not configured"))?;

        let (player, house, request) = match &self.state {
            RoundState::RequestPending {
                player,
                house,
                request,
            } => (player, *house, request),
            state => {
                return Err(WagerError::invalid_state(format!(
                    "No outstanding request, round is {}",
                    state.phase()
                )))
            }
        };

        let deadline = request
            .requested_at
            .checked_add_signed(timeout)
            .ok_or(WagerError::ArithmeticOverflow)?;
        if ctx.now < deadline {
            return Err(WagerError::RequestNotExpired { deadline });
        }

        tracing::warn!(
            "Randomness request {} expired at {}, returning stakes",
            request.id,
            deadline
        );

        let ops = vec![
            self.return_player_stake(player),
            self.return_house_stake(house),
        ];
        self.state = RoundState::Empty;
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use coinflip_core::ReservationId;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn mutez(n: u64) -> Amount {
        Amount::from_mutez(n)
    }

    fn ctx(sender: &str, amount: u64) -> CallContext {
        CallContext::new(addr(sender), mutez(amount), mutez(amount), Utc::now())
    }

    fn escrow() -> EscrowRound {
        let config = EscrowConfig::new(addr("ledger"), addr("oracle"));
        EscrowRound::new(addr("escrow"), config).unwrap()
    }

    fn relayed(player: &str, prediction: bool) -> StakeSide {
        StakeSide::Player {
            player: addr(player),
            prediction,
            reservation: ReservationId::new(),
        }
    }

    fn requests(ops: &[Operation]) -> usize {
        ops.iter()
            .filter(|op| matches!(op, Operation::RequestRandomness(_)))
            .count()
    }

    #[test]
    fn test_pair_issues_exactly_one_request() {
        for house_first in [true, false] {
            let mut escrow = escrow();
            let mut issued = 0;

            if house_first {
                issued += requests(&escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap());
                assert_eq!(escrow.phase(), RoundPhase::OneSideStaked);
                issued += requests(&escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap());
            } else {
                issued += requests(&escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap());
                assert_eq!(escrow.phase(), RoundPhase::OneSideStaked);
                issued += requests(&escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap());
            }

            assert_eq!(issued, 1);
            assert_eq!(escrow.phase(), RoundPhase::RequestPending);
            let request = escrow.pending_request().unwrap();
            assert_eq!(request.spec_id, "coin_flip");
            assert_eq!(request.callback, addr("escrow"));
            assert_eq!(request.entrypoint, "receive_randomness");

            // Neither side can re-stake while the request is outstanding.
            assert!(matches!(
                escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)),
                Err(WagerError::InvalidState(_))
            ));
            assert!(matches!(
                escrow.place_bet(&ctx("alice", 50), StakeSide::Direct { prediction: true }),
                Err(WagerError::InvalidState(_))
            ));
            assert!(matches!(
                escrow.place_bet(&ctx("ledger", 10), StakeSide::House),
                Err(WagerError::InvalidState(_))
            ));
            assert_eq!(escrow.phase(), RoundPhase::RequestPending);
        }
    }

    #[test]
    fn test_place_bet_authorization() {
        let mut escrow = escrow();

        // Nobody designated yet.
        assert!(matches!(
            escrow.place_bet(&ctx("alice", 50), StakeSide::Direct { prediction: true }),
            Err(WagerError::Unauthorized { .. })
        ));
        assert!(matches!(
            escrow.place_bet(&ctx("oracle", 50), StakeSide::House),
            Err(WagerError::Unauthorized { .. })
        ));
        assert!(matches!(
            escrow.place_bet(&ctx("alice", 50), relayed("alice", true)),
            Err(WagerError::Unauthorized { .. })
        ));

        escrow.set_player(&ctx("ledger", 0), addr("alice")).unwrap();
        assert!(matches!(
            escrow.place_bet(&ctx("bob", 50), StakeSide::Direct { prediction: true }),
            Err(WagerError::Unauthorized { .. })
        ));
        assert!(matches!(
            escrow.place_bet(&ctx("alice", 0), StakeSide::Direct { prediction: true }),
            Err(WagerError::InvalidAmount(_))
        ));

        escrow
            .place_bet(&ctx("alice", 50), StakeSide::Direct { prediction: true })
            .unwrap();
        let stake = escrow.state().player_stake().unwrap();
        assert_eq!(stake.source, StakeSource::Direct);
        assert_eq!(stake.amount, mutez(50));
    }

    #[test]
    fn test_set_player_rules() {
        let mut escrow = escrow();

        assert!(matches!(
            escrow.set_player(&ctx("alice", 0), addr("alice")),
            Err(WagerError::Unauthorized { .. })
        ));

        escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap();
        escrow.set_player(&ctx("ledger", 0), addr("alice")).unwrap();
        assert_eq!(escrow.designated_player(), Some(&addr("alice")));

        escrow
            .place_bet(&ctx("ledger", 20), relayed("alice", false))
            .unwrap();
        assert!(matches!(
            escrow.set_player(&ctx("ledger", 0), addr("bob")),
            Err(WagerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_restake_returns_displaced_stake() {
        let mut escrow = escrow();

        escrow.place_bet(&ctx("ledger", 40), relayed("alice", true)).unwrap();
        let ops = escrow
            .place_bet(&ctx("ledger", 60), relayed("bob", false))
            .unwrap();

        assert_eq!(
            ops,
            vec![Operation::Transfer {
                to: addr("alice"),
                amount: mutez(40)
            }]
        );
        let stake = escrow.state().player_stake().unwrap();
        assert_eq!(stake.player, addr("bob"));
        assert_eq!(stake.amount, mutez(60));
        assert!(!stake.prediction);
        assert_eq!(escrow.designated_player(), Some(&addr("bob")));

        let mut escrow = self::escrow();
        escrow.place_bet(&ctx("ledger", 500), StakeSide::House).unwrap();
        let ops = escrow.place_bet(&ctx("ledger", 700), StakeSide::House).unwrap();
        assert_eq!(
            ops,
            vec![Operation::Transfer {
                to: addr("ledger"),
                amount: mutez(500)
            }]
        );
        assert_eq!(escrow.state().house_stake(), mutez(700));
    }

    #[test]
    fn test_receive_randomness_guards() {
        let mut escrow = escrow();

        assert_eq!(
            escrow.receive_randomness(&ctx("oracle", 0), 123_456_789),
            Err(WagerError::RandomnessNotRequested)
        );

        escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap();
        escrow.place_bet(&ctx("ledger", 50), StakeSide::House).unwrap();
        let before = escrow.state().clone();

        assert!(matches!(
            escrow.receive_randomness(&ctx("alice", 0), 123_456_789),
            Err(WagerError::Unauthorized { .. })
        ));
        assert_eq!(escrow.state(), &before);
    }

    #[test]
    fn test_payout_loss_then_reset() {
        let mut escrow = escrow();
        escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap();
        escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap();

        let ops = escrow
            .receive_randomness(&ctx("oracle", 0), 123_456_789)
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::FinishGame {
                ledger: addr("ledger"),
                amount: mutez(1050),
                player: addr("alice"),
                refund: Amount::ZERO,
            }]
        );
        assert_eq!(escrow.phase(), RoundPhase::RandomnessReceived);

        // Retry emits the same credit.
        assert_eq!(escrow.perform_payout(&ctx("anyone", 0)).unwrap(), ops);

        let settlement = escrow.complete_payout().unwrap();
        assert!(!settlement.won);
        assert_eq!(escrow.phase(), RoundPhase::Empty);
        assert_eq!(escrow.state().staked_total(), Amount::ZERO);

        // A replayed callback finds nothing outstanding.
        assert_eq!(
            escrow.receive_randomness(&ctx("oracle", 0), 2),
            Err(WagerError::RandomnessNotRequested)
        );
        assert!(matches!(
            escrow.perform_payout(&ctx("anyone", 0)),
            Err(WagerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_payout_win() {
        let mut escrow = escrow();
        escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap();
        escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap();

        let ops = escrow.receive_randomness(&ctx("oracle", 0), 2).unwrap();
        assert_eq!(
            ops,
            vec![Operation::FinishGame {
                ledger: addr("ledger"),
                amount: mutez(1050),
                player: addr("alice"),
                refund: mutez(1030),
            }]
        );
    }

    #[test]
    fn test_cancel_request_after_timeout() {
        let config = EscrowConfig::new(addr("ledger"), addr("oracle")).with_request_timeout(60);
        let mut escrow = EscrowRound::new(addr("escrow"), config).unwrap();

        escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap();
        escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap();
        let requested_at = escrow.pending_request().unwrap().requested_at;

        let mut early = ctx("anyone", 0);
        early.now = requested_at + Duration::seconds(59);
        assert!(matches!(
            escrow.cancel_request(&early),
            Err(WagerError::RequestNotExpired { .. })
        ));

        let mut late = ctx("anyone", 0);
        late.now = requested_at + Duration::seconds(60);
        let ops = escrow.cancel_request(&late).unwrap();
        assert_eq!(
            ops,
            vec![
                Operation::Transfer {
                    to: addr("alice"),
                    amount: mutez(50)
                },
                Operation::Transfer {
                    to: addr("ledger"),
                    amount: mutez(1000)
                },
            ]
        );
        assert_eq!(escrow.phase(), RoundPhase::Empty);
        assert_eq!(
            escrow.receive_randomness(&ctx("oracle", 0), 2),
            Err(WagerError::RandomnessNotRequested)
        );
    }

    #[test]
    fn test_cancel_deadline_overflow() {
        let config = EscrowConfig::new(addr("ledger"), addr("oracle")).with_request_timeout(60);
        let mut escrow = EscrowRound::new(addr("escrow"), config).unwrap();

        let mut late = ctx("ledger", 1000);
        late.now = DateTime::<Utc>::MAX_UTC - Duration::seconds(1);
        escrow.place_bet(&late, StakeSide::House).unwrap();
        late.amount = mutez(50);
        escrow.place_bet(&late, relayed("alice", true)).unwrap();

        late.amount = Amount::ZERO;
        assert_eq!(
            escrow.cancel_request(&late),
            Err(WagerError::ArithmeticOverflow)
        );
        assert_eq!(escrow.phase(), RoundPhase::RequestPending);
    }

    #[test]
    fn test_value_only_accepted_by_place_bet() {
        let config = EscrowConfig::new(addr("ledger"), addr("oracle")).with_request_timeout(60);
        let mut escrow = EscrowRound::new(addr("escrow"), config).unwrap();

        assert!(matches!(
            escrow.set_player(&ctx("ledger", 5), addr("alice")),
            Err(WagerError::InvalidAmount(_))
        ));
        assert_eq!(escrow.designated_player(), None);

        escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap();
        escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap();

        let mut late = ctx("anyone", 300);
        late.now = Utc::now() + Duration::seconds(120);
        assert!(matches!(
            escrow.cancel_request(&late),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(matches!(
            escrow.receive_randomness(&ctx("oracle", 300), 3),
            Err(WagerError::InvalidAmount(_))
        ));
        assert_eq!(escrow.phase(), RoundPhase::RequestPending);

        escrow.receive_randomness(&ctx("oracle", 0), 3).unwrap();
        assert!(matches!(
            escrow.perform_payout(&ctx("anyone", 1)),
            Err(WagerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_unpayable_randomness_leaves_request_pending() {
        let mut escrow = escrow();
        escrow
            .place_bet(&ctx("ledger", u64::MAX), StakeSide::House)
            .unwrap();
        escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap();
        let before = escrow.state().clone();

        // The pot does not fit in an amount.
        assert_eq!(
            escrow.receive_randomness(&ctx("oracle", 0), 2),
            Err(WagerError::ArithmeticOverflow)
        );
        assert_eq!(escrow.state(), &before);
        assert!(escrow.pending_request().is_some());
    }

    #[test]
    fn test_cancel_without_timeout_rejected() {
        let mut escrow = escrow();
        escrow.place_bet(&ctx("ledger", 1000), StakeSide::House).unwrap();
        escrow.place_bet(&ctx("ledger", 50), relayed("alice", true)).unwrap();

        let mut far_future = ctx("anyone", 0);
        far_future.now = Utc::now() + Duration::days(365);
        assert!(matches!(
            escrow.cancel_request(&far_future),
            Err(WagerError::InvalidState(_))
        ));
        assert_eq!(escrow.phase(), RoundPhase::RequestPending);
    }
}
