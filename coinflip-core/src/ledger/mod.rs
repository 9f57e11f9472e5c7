pub mod config;

pub use config::{BetLimitSource, LedgerConfig};

use crate::error::{Result, WagerError};
use crate::operation::{Operation, StakeSide};
use crate::types::{Address, Amount, CallContext, ReservationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bet debited from a player but not yet accepted by the escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetReservation {
    pub id: ReservationId,
    pub player: Address,
    pub amount: Amount,
    pub prediction: bool,
    pub created_at: DateTime<Utc>,
}

/// Authoritative store of player balances.
///
/// Player funds are held in the ledger's native balance; the account map only
/// tracks who owns how much of it. Whatever exceeds `total_players_balance`
/// belongs to the house.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceLedger {
    address: Address,
    config: LedgerConfig,
    players: BTreeMap<Address, Amount>,
    total_players_balance: Amount,
    reservations: BTreeMap<ReservationId, BetReservation>,
}

impl BalanceLedger {
    pub fn new(address: Address, config: LedgerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            address,
            config,
            players: BTreeMap::new(),
            total_players_balance: Amount::ZERO,
            reservations: BTreeMap::new(),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Zero for unknown addresses.
    pub fn get_balance(&self, player: &Address) -> Amount {
        self.players.get(player).copied().unwrap_or_default()
    }

    pub fn is_registered(&self, player: &Address) -> bool {
        self.players.contains_key(player)
    }

    pub fn total_players_balance(&self) -> Amount {
        self.total_players_balance
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, Amount)> {
        self.players.iter().map(|(address, amount)| (address, *amount))
    }

    pub fn reservations(&self) -> impl Iterator<Item = &BetReservation> {
        self.reservations.values()
    }

    /// Native balance not owed to any player.
    pub fn house_funds(&self, native_balance: Amount) -> Amount {
        native_balance
            .checked_sub(self.total_players_balance)
            .unwrap_or_default()
    }

    pub fn deposit(&mut self, ctx: &CallContext) -> Result<Vec<Operation>> {
        if ctx.amount.is_zero() {
            return Err(WagerError::invalid_amount("Deposit must be greater than 0"));
        }

        let balance = self.get_balance(&ctx.sender).try_add(ctx.amount)?;
        let total = self.total_players_balance.try_add(ctx.amount)?;

        self.players.insert(ctx.sender.clone(), balance);
        self.total_players_balance = total;

        tracing::info!("Player {} deposited {}, balance {}", ctx.sender, ctx.amount, balance);
        Ok(Vec::new())
    }

    pub fn withdraw(&mut self, ctx: &CallContext) -> Result<Vec<Operation>> {
        ctx.reject_value("withdraw")?;
        let amount = self
            .players
            .get(&ctx.sender)
            .copied()
            .ok_or_else(|| WagerError::NotRegistered(ctx.sender.clone()))?;

        if amount.is_zero() {
            return Err(WagerError::InsufficientBalance {
                need: 1,
                available: 0,
            });
        }

        let total = self.total_players_balance.try_sub(amount)?;

        self.players.insert(ctx.sender.clone(), Amount::ZERO);
        self.total_players_balance = total;

        tracing::info!("Player {} withdrew {}", ctx.sender, amount);
        Ok(vec![Operation::Transfer {
            to: ctx.sender.clone(),
            amount,
        }])
    }

    /// Debit the caller and forward the stake to the escrow.
    ///
    /// The debit is held as a [`BetReservation`] until the host reports the
    /// escrow's verdict through [`confirm_bet`](Self::confirm_bet) or
    /// [`refund_bet`](Self::refund_bet).
    pub fn bet(
        &mut self,
        ctx: &CallContext,
        amount: Amount,
        prediction: bool,
        observed_contract_balance: Amount,
    ) -> Result<Vec<Operation>> {
        ctx.reject_value("bet")?;
        if amount.is_zero() {
            return Err(WagerError::invalid_amount("Bet must be greater than 0"));
        }

        let available = self
            .players
            .get(&ctx.sender)
            .copied()
            .ok_or_else(|| WagerError::NotRegistered(ctx.sender.clone()))?;

        if available < amount {
            return Err(WagerError::InsufficientBalance {
                need: amount.to_mutez(),
                available: available.to_mutez(),
            });
        }

        let limit = self.max_bet(ctx, observed_contract_balance);
        if amount > limit {
            return Err(WagerError::BetExceedsLimit {
                amount: amount.to_mutez(),
                limit: limit.to_mutez(),
            });
        }

        let escrow = self
            .config
            .escrow
            .clone()
            .ok_or(WagerError::EscrowNotConfigured)?;

        let balance = available.try_sub(amount)?;
        let total = self.total_players_balance.try_sub(amount)?;

        let reservation = BetReservation {
            id: ReservationId::new(),
            player: ctx.sender.clone(),
            amount,
            prediction,
            created_at: ctx.now,
        };
        let reservation_id = reservation.id;

        self.players.insert(ctx.sender.clone(), balance);
        self.total_players_balance = total;
        self.reservations.insert(reservation_id, reservation);

        tracing::info!(
            "Player {} bet {} on {} (reservation {})",
            ctx.sender,
            amount,
            if prediction { "even" } else { "odd" },
            reservation_id
        );

        Ok(vec![Operation::PlaceBet {
            escrow,
            amount,
            side: StakeSide::Player {
                player: ctx.sender.clone(),
                prediction,
                reservation: reservation_id,
            },
        }])
    }

    fn max_bet(&self, ctx: &CallContext, observed_contract_balance: Amount) -> Amount {
        let base = match self.config.bet_limit {
            BetLimitSource::CallerReported => observed_contract_balance,
            BetLimitSource::Authoritative => ctx.balance,
        };
        Amount::from_mutez(base.to_mutez() / self.config.max_bet_divisor)
    }

    /// Escrow accepted the stake; the debit becomes final.
    pub fn confirm_bet(&mut self, id: ReservationId) -> Result<BetReservation> {
        let reservation = self
            .reservations
            .remove(&id)
            .ok_or(WagerError::UnknownReservation(id))?;

        tracing::debug!("Bet reservation {} confirmed", id);
        Ok(reservation)
    }

    /// Escrow rejected the stake; give the player their money back.
    pub fn refund_bet(&mut self, id: ReservationId) -> Result<BetReservation> {
        let reservation = self
            .reservations
            .get(&id)
            .cloned()
            .ok_or(WagerError::UnknownReservation(id))?;

        let balance = self
            .get_balance(&reservation.player)
            .try_add(reservation.amount)?;
        let total = self.total_players_balance.try_add(reservation.amount)?;

        self.players.insert(reservation.player.clone(), balance);
        self.total_players_balance = total;
        self.reservations.remove(&id);

        tracing::warn!(
            "Bet reservation {} refunded {} to {}",
            id,
            reservation.amount,
            reservation.player
        );
        Ok(reservation)
    }

    pub fn finish_game(
        &mut self,
        ctx: &CallContext,
        player: &Address,
        refund: Amount,
    ) -> Result<Vec<Operation>> {
        if ctx.sender != self.config.oracle {
            return Err(WagerError::unauthorized(&ctx.sender, "finish_game"));
        }

        let current = self
            .players
            .get(player)
            .copied()
            .ok_or_else(|| WagerError::UnknownPlayer(player.clone()))?;

        let balance = current.try_add(refund)?;
        let total = self.total_players_balance.try_add(refund)?;

        self.players.insert(player.clone(), balance);
        self.total_players_balance = total;

        tracing::info!("Game finished for {}: refund {}, balance {}", player, refund, balance);
        Ok(Vec::new())
    }

    pub fn owner_withdraw(
        &mut self,
        ctx: &CallContext,
        destination: Address,
        amount: Amount,
    ) -> Result<Vec<Operation>> {
        self.ensure_owner(ctx, "owner_withdraw")?;
        ctx.reject_value("owner_withdraw")?;

        if amount.is_zero() {
            return Err(WagerError::invalid_amount(
                "Withdraw amount must be greater than 0",
            ));
        }

        let required = amount.try_add(self.total_players_balance)?;
        if ctx.balance < required {
            return Err(WagerError::InsufficientBalance {
                need: required.to_mutez(),
                available: ctx.balance.to_mutez(),
            });
        }

        tracing::info!("Owner withdrew {} to {}", amount, destination);
        Ok(vec![Operation::Transfer {
            to: destination,
            amount,
        }])
    }

    /// Stake house funds on the counter side of the current round.
    pub fn counter_stake(&mut self, ctx: &CallContext, amount: Amount) -> Result<Vec<Operation>> {
        self.ensure_owner(ctx, "counter_stake")?;
        ctx.reject_value("counter_stake")?;

        if amount.is_zero() {
            return Err(WagerError::invalid_amount("Stake must be greater than 0"));
        }

        let escrow = self
            .config
            .escrow
            .clone()
            .ok_or(WagerError::EscrowNotConfigured)?;

        let house = self.house_funds(ctx.balance);
        if house < amount {
            return Err(WagerError::InsufficientBalance {
                need: amount.to_mutez(),
                available: house.to_mutez(),
            });
        }

        tracing::info!("House staked {} on the counter side", amount);
        Ok(vec![Operation::PlaceBet {
            escrow,
            amount,
            side: StakeSide::House,
        }])
    }

    /// Let `player` stake directly with the escrow.
    pub fn designate_player(
        &mut self,
        ctx: &CallContext,
        player: Address,
    ) -> Result<Vec<Operation>> {
        self.ensure_owner(ctx, "designate_player")?;
        ctx.reject_value("designate_player")?;

        let escrow = self
            .config
            .escrow
            .clone()
            .ok_or(WagerError::EscrowNotConfigured)?;

        Ok(vec![Operation::SetPlayer { escrow, player }])
    }

    pub fn set_escrow(&mut self, ctx: &CallContext, escrow: Address) -> Result<Vec<Operation>> {
        self.ensure_owner(ctx, "set_escrow")?;
        ctx.reject_value("set_escrow")?;

        tracing::info!("Escrow set to {}", escrow);
        self.config.escrow = Some(escrow);
        Ok(Vec::new())
    }

    pub fn set_oracle(&mut self, ctx: &CallContext, oracle: Address) -> Result<Vec<Operation>> {
        self.ensure_owner(ctx, "set_oracle")?;
        ctx.reject_value("set_oracle")?;

        tracing::info!("Oracle set to {}", oracle);
        self.config.oracle = oracle;
        Ok(Vec::new())
    }

    fn ensure_owner(&self, ctx: &CallContext, operation: &'static str) -> Result<()> {
        if ctx.sender != self.config.owner {
            return Err(WagerError::unauthorized(&ctx.sender, operation));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn mutez(n: u64) -> Amount {
        Amount::from_mutez(n)
    }

    fn ctx(sender: &str, amount: u64) -> CallContext {
        CallContext::new(addr(sender), mutez(amount), mutez(amount), Utc::now())
    }

    fn ctx_with_balance(sender: &str, balance: u64) -> CallContext {
        CallContext::new(addr(sender), Amount::ZERO, mutez(balance), Utc::now())
    }

    fn ledger() -> BalanceLedger {
        let config = LedgerConfig::new(addr("owner"), addr("oracle")).with_escrow(addr("escrow"));
        BalanceLedger::new(addr("ledger"), config).unwrap()
    }

    fn sum_of_accounts(ledger: &BalanceLedger) -> u64 {
        ledger.accounts().map(|(_, a)| a.to_mutez()).sum()
    }

    #[test]
    fn test_value_refused_where_not_expected() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 100)).unwrap();

        assert!(matches!(
            ledger.withdraw(&ctx("alice", 5)),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.bet(&ctx("alice", 5), mutez(1), true, mutez(1000)),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.counter_stake(&ctx("owner", 5), mutez(1)),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.owner_withdraw(&ctx("owner", 5), addr("owner"), mutez(1)),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.designate_player(&ctx("owner", 5), addr("alice")),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.set_oracle(&ctx("owner", 5), addr("other")),
            Err(WagerError::InvalidAmount(_))
        ));

        assert_eq!(ledger.get_balance(&addr("alice")), mutez(100));
        assert_eq!(ledger.config().oracle, addr("oracle"));
        assert_eq!(ledger.reservations().count(), 0);
    }

    #[test]
    fn test_deposit_credits_account_and_aggregate() {
        let mut ledger = ledger();

        for amount in [1u64, 7, 1000] {
            let before = ledger.get_balance(&addr("alice"));
            let total_before = ledger.total_players_balance();

            ledger.deposit(&ctx("alice", amount)).unwrap();

            assert_eq!(ledger.get_balance(&addr("alice")), before.try_add(mutez(amount)).unwrap());
            assert_eq!(
                ledger.total_players_balance(),
                total_before.try_add(mutez(amount)).unwrap()
            );
        }
        assert_eq!(sum_of_accounts(&ledger), ledger.total_players_balance().to_mutez());
    }

    #[test]
    fn test_zero_deposit_rejected() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.deposit(&ctx("alice", 0)),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(!ledger.is_registered(&addr("alice")));
    }

    #[test]
    fn test_withdraw_zeroes_account_and_transfers() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 1000)).unwrap();
        ledger.deposit(&ctx("bob", 2000)).unwrap();

        let ops = ledger.withdraw(&ctx("alice", 0)).unwrap();

        assert_eq!(
            ops,
            vec![Operation::Transfer {
                to: addr("alice"),
                amount: mutez(1000)
            }]
        );
        assert_eq!(ledger.get_balance(&addr("alice")), Amount::ZERO);
        assert_eq!(ledger.total_players_balance(), mutez(2000));
        assert!(ledger.is_registered(&addr("alice")));
    }

    #[test]
    fn test_withdraw_failures() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.withdraw(&ctx("alice", 0)),
            Err(WagerError::NotRegistered(_))
        ));

        ledger.deposit(&ctx("alice", 10)).unwrap();
        ledger.withdraw(&ctx("alice", 0)).unwrap();
        assert!(matches!(
            ledger.withdraw(&ctx("alice", 0)),
            Err(WagerError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_bet_limit_is_two_percent_of_observed_balance() {
        for observed in [0u64, 49, 50, 2500, 5049] {
            let limit = observed / 50;

            let mut ledger = ledger();
            ledger.deposit(&ctx("alice", 10_000)).unwrap();

            let over = ledger.bet(&ctx("alice", 0), mutez(limit + 1), true, mutez(observed));
            assert_eq!(
                over,
                Err(WagerError::BetExceedsLimit {
                    amount: limit + 1,
                    limit
                })
            );

            if limit > 0 {
                ledger
                    .bet(&ctx("alice", 0), mutez(limit), true, mutez(observed))
                    .unwrap();
                assert_eq!(ledger.get_balance(&addr("alice")), mutez(10_000 - limit));
                assert_eq!(ledger.total_players_balance(), mutez(10_000 - limit));
            }
        }
    }

    #[test]
    fn test_bet_forwards_stake_to_escrow() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 1000)).unwrap();

        let ops = ledger
            .bet(&ctx("alice", 0), mutez(50), true, mutez(5000))
            .unwrap();

        let reservation = ledger.reservations().next().unwrap().clone();
        assert_eq!(reservation.amount, mutez(50));
        assert_eq!(
            ops,
            vec![Operation::PlaceBet {
                escrow: addr("escrow"),
                amount: mutez(50),
                side: StakeSide::Player {
                    player: addr("alice"),
                    prediction: true,
                    reservation: reservation.id,
                },
            }]
        );
    }

    #[test]
    fn test_bet_rejections_leave_state_untouched() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 100)).unwrap();

        assert!(matches!(
            ledger.bet(&ctx("mallory", 0), mutez(1), true, mutez(5000)),
            Err(WagerError::NotRegistered(_))
        ));
        assert!(matches!(
            ledger.bet(&ctx("alice", 0), mutez(101), true, mutez(1_000_000)),
            Err(WagerError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            ledger.bet(&ctx("alice", 0), Amount::ZERO, true, mutez(5000)),
            Err(WagerError::InvalidAmount(_))
        ));

        let config = LedgerConfig::new(addr("owner"), addr("oracle"));
        let mut unwired = BalanceLedger::new(addr("ledger"), config).unwrap();
        unwired.deposit(&ctx("alice", 100)).unwrap();
        assert_eq!(
            unwired.bet(&ctx("alice", 0), mutez(10), true, mutez(5000)),
            Err(WagerError::EscrowNotConfigured)
        );

        assert_eq!(ledger.get_balance(&addr("alice")), mutez(100));
        assert_eq!(ledger.total_players_balance(), mutez(100));
        assert_eq!(ledger.reservations().count(), 0);
    }

    #[test]
    fn test_authoritative_limit_ignores_reported_balance() {
        let config = LedgerConfig::new(addr("owner"), addr("oracle"))
            .with_escrow(addr("escrow"))
            .with_bet_limit(BetLimitSource::Authoritative);
        let mut ledger = BalanceLedger::new(addr("ledger"), config).unwrap();
        ledger.deposit(&ctx("alice", 1000)).unwrap();

        // Inflated report, real balance only allows 20.
        let result = ledger.bet(&ctx_with_balance("alice", 1000), mutez(21), true, mutez(1_000_000));
        assert_eq!(
            result,
            Err(WagerError::BetExceedsLimit {
                amount: 21,
                limit: 20
            })
        );
        assert!(ledger
            .bet(&ctx_with_balance("alice", 1000), mutez(20), true, Amount::ZERO)
            .is_ok());
    }

    #[test]
    fn test_confirm_and_refund_reservations() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 1000)).unwrap();

        ledger.bet(&ctx("alice", 0), mutez(10), true, mutez(5000)).unwrap();
        let first = ledger.reservations().next().unwrap().id;
        ledger.confirm_bet(first).unwrap();
        assert_eq!(ledger.get_balance(&addr("alice")), mutez(990));

        ledger.bet(&ctx("alice", 0), mutez(20), false, mutez(5000)).unwrap();
        let second = ledger.reservations().next().unwrap().id;
        ledger.refund_bet(second).unwrap();
        assert_eq!(ledger.get_balance(&addr("alice")), mutez(990));
        assert_eq!(ledger.total_players_balance(), mutez(990));

        assert_eq!(
            ledger.refund_bet(second),
            Err(WagerError::UnknownReservation(second))
        );
        assert_eq!(
            ledger.confirm_bet(first),
            Err(WagerError::UnknownReservation(first))
        );
    }

    #[test]
    fn test_finish_game_authorization() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 1000)).unwrap();

        assert!(matches!(
            ledger.finish_game(&ctx("owner", 0), &addr("alice"), mutez(20)),
            Err(WagerError::Unauthorized { .. })
        ));
        assert_eq!(
            ledger.finish_game(&ctx("oracle", 0), &addr("ghost"), mutez(20)),
            Err(WagerError::UnknownPlayer(addr("ghost")))
        );

        ledger
            .finish_game(&ctx("oracle", 0), &addr("alice"), mutez(20))
            .unwrap();
        assert_eq!(ledger.get_balance(&addr("alice")), mutez(1020));
        assert_eq!(ledger.total_players_balance(), mutez(1020));
    }

    #[test]
    fn test_owner_withdraw_never_touches_player_funds() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 1000)).unwrap();

        assert!(matches!(
            ledger.owner_withdraw(&ctx_with_balance("alice", 5000), addr("alice"), mutez(100)),
            Err(WagerError::Unauthorized { .. })
        ));
        assert!(matches!(
            ledger.owner_withdraw(&ctx_with_balance("owner", 5000), addr("owner"), Amount::ZERO),
            Err(WagerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.owner_withdraw(&ctx_with_balance("owner", 1050), addr("owner"), mutez(100)),
            Err(WagerError::InsufficientBalance { .. })
        ));

        let ops = ledger
            .owner_withdraw(&ctx_with_balance("owner", 1100), addr("treasury"), mutez(100))
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::Transfer {
                to: addr("treasury"),
                amount: mutez(100)
            }]
        );
    }

    #[test]
    fn test_counter_stake_uses_house_funds_only() {
        let mut ledger = ledger();
        ledger.deposit(&ctx("alice", 1000)).unwrap();

        assert!(matches!(
            ledger.counter_stake(&ctx_with_balance("owner", 1500), mutez(600)),
            Err(WagerError::InsufficientBalance { .. })
        ));

        let ops = ledger
            .counter_stake(&ctx_with_balance("owner", 1500), mutez(500))
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::PlaceBet {
                escrow: addr("escrow"),
                amount: mutez(500),
                side: StakeSide::House,
            }]
        );
    }

    #[test]
    fn test_configuration_is_owner_gated() {
        let mut ledger = ledger();

        assert!(matches!(
            ledger.set_escrow(&ctx("alice", 0), addr("evil")),
            Err(WagerError::Unauthorized { .. })
        ));
        assert!(matches!(
            ledger.set_oracle(&ctx("alice", 0), addr("evil")),
            Err(WagerError::Unauthorized { .. })
        ));
        assert!(matches!(
            ledger.designate_player(&ctx("alice", 0), addr("alice")),
            Err(WagerError::Unauthorized { .. })
        ));

        ledger.set_oracle(&ctx("owner", 0), addr("oracle2")).unwrap();
        assert_eq!(ledger.config().oracle, addr("oracle2"));

        let ops = ledger
            .designate_player(&ctx("owner", 0), addr("alice"))
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::SetPlayer {
                escrow: addr("escrow"),
                player: addr("alice")
            }]
        );
    }

    #[test]
    fn test_unknown_address_balance_is_zero() {
        let ledger = ledger();
        assert_eq!(ledger.get_balance(&addr("nobody")), Amount::ZERO);
    }
}
