use crate::round::PlayerStake;
use coinflip_core::{Address, Amount, Result, WagerError};
use serde::{Deserialize, Serialize};

/// Retained from the counter stake when the player wins.
pub const DEFAULT_HOUSE_FEE_PERCENT: u64 = 2;

/// An even value means the outcome is `true`.
pub fn is_win(prediction: bool, value: u128) -> bool {
    prediction == (value % 2 == 0)
}

/// `player_stake + floor(house_stake * (100 - fee) / 100)` on a win, zero otherwise.
pub fn compute_refund(
    player_stake: Amount,
    house_stake: Amount,
    prediction: bool,
    value: u128,
    fee_percent: u64,
) -> Result<Amount> {
    if !is_win(prediction, value) {
        return Ok(Amount::ZERO);
    }

    let kept = u128::from(100u64.saturating_sub(fee_percent));
    let winnings = u128::from(house_stake.to_mutez()) * kept / 100;
    let winnings = u64::try_from(winnings).map_err(|_| WagerError::ArithmeticOverflow)?;

    player_stake.try_add(Amount::from_mutez(winnings))
}

/// Outcome of a round once its random value is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub player: Address,
    pub prediction: bool,
    pub value: u128,
    pub won: bool,
    pub player_stake: Amount,
    pub house_stake: Amount,
    pub refund: Amount,
    /// Everything the escrow holds for the round; goes back to the ledger.
    pub pot: Amount,
}

impl Settlement {
    pub fn compute(
        stake: &PlayerStake,
        house_stake: Amount,
        value: u128,
        fee_percent: u64,
    ) -> Result<Self> {
        let refund = compute_refund(stake.amount, house_stake, stake.prediction, value, fee_percent)?;
        let pot = stake.amount.try_add(house_stake)?;

        Ok(Self {
            player: stake.player.clone(),
            prediction: stake.prediction,
            value,
            won: is_win(stake.prediction, value),
            player_stake: stake.amount,
            house_stake,
            refund,
            pot,
        })
    }
}
