//! Guessing Game Engine: derives outcomes from the random beacon and owns
//! all treasury accounting. Session state is only ever mutated here; the
//! gateway hands over nothing but a session id.

use cosmwasm_std::{Addr, StdError, Storage, Uint128};

use crate::error::ContractError;
use crate::state::{SessionStatus, RESERVED, SESSIONS, TREASURY};

/// Winners are paid stake * PAYOUT_MULTIPLIER
pub const PAYOUT_MULTIPLIER: u64 = 3;

/// What the contract layer needs to act on a resolution.
#[derive(Debug)]
pub struct Resolution {
    pub owner: Addr,
    pub outcome: u8,
    pub status: SessionStatus,
    /// Amount owed to the winner, zero for a lost session.
    pub payout: Uint128,
    /// False when the treasury could not cover the payout and it was
    /// reserved for a later retry instead.
    pub paid: bool,
}

/// Maps the final random value onto 1..=max_number.
pub fn outcome_from_randomness(randomness: [u8; 32], max_number: u8) -> u8 {
    // The u64 range is large compared to the modulo, so the distribution is expected to be good enough.
    // See https://research.kudelskisecurity.com/2020/07/28/the-definitive-guide-to-modulo-bias-and-how-to-avoid-it/
    let value = u64::from_be_bytes([
        randomness[0],
        randomness[1],
        randomness[2],
        randomness[3],
        randomness[4],
        randomness[5],
        randomness[6],
        randomness[7],
    ]);
    (value % u64::from(max_number)) as u8 + 1
}

/// Credits the treasury and returns the new balance.
pub fn deposit(storage: &mut dyn Storage, amount: Uint128) -> Result<Uint128, ContractError> {
    let balance = TREASURY
        .load(storage)?
        .checked_add(amount)
        .map_err(StdError::overflow)?;
    TREASURY.save(storage, &balance)?;
    Ok(balance)
}

/// Balance not owed to won-but-unpaid sessions.
pub fn unreserved(storage: &dyn Storage) -> Result<Uint128, ContractError> {
    let treasury = TREASURY.load(storage)?;
    let reserved = RESERVED.load(storage)?;
    Ok(treasury.checked_sub(reserved).unwrap_or_default())
}

/// Debits an owner withdrawal. Reserved payouts are untouchable.
pub fn withdraw(storage: &mut dyn Storage, amount: Uint128) -> Result<(), ContractError> {
    if amount > unreserved(storage)? {
        return Err(ContractError::InsufficientTreasury);
    }
    let treasury = TREASURY.load(storage)?;
    TREASURY.save(storage, &(treasury - amount))?;
    Ok(())
}

/// Resolves a pending session against the random value. Invoked only from
/// the gateway's fulfillment path, after the pending request was consumed.
pub fn resolve_session(
    storage: &mut dyn Storage,
    session_id: u64,
    randomness: [u8; 32],
    max_number: u8,
) -> Result<Resolution, ContractError> {
    let mut session = SESSIONS.load(storage, session_id)?;
    if session.status != SessionStatus::Pending {
        return Err(ContractError::SessionAlreadyResolved);
    }

    let outcome = outcome_from_randomness(randomness, max_number);
    if outcome != session.number {
        // the house keeps the stake
        session.status = SessionStatus::Lost;
        SESSIONS.save(storage, session_id, &session)?;
        return Ok(Resolution {
            owner: session.owner,
            outcome,
            status: SessionStatus::Lost,
            payout: Uint128::zero(),
            paid: false,
        });
    }

    let payout = session
        .stake
        .checked_mul(Uint128::from(PAYOUT_MULTIPLIER))
        .map_err(StdError::overflow)?;
    let paid = payout <= unreserved(storage)?;
    if paid {
        let treasury = TREASURY.load(storage)?;
        TREASURY.save(storage, &(treasury - payout))?;
        session.status = SessionStatus::Settled;
    } else {
        // short on funds, keep the session owed until someone tops up
        let reserved = RESERVED
            .load(storage)?
            .checked_add(payout)
            .map_err(StdError::overflow)?;
        RESERVED.save(storage, &reserved)?;
        session.status = SessionStatus::Won;
    }
    SESSIONS.save(storage, session_id, &session)?;

    Ok(Resolution {
        owner: session.owner,
        outcome,
        status: session.status,
        payout,
        paid,
    })
}

/// Retries the payment of a session that won while the treasury was short.
/// The randomness outcome is not re-derived.
pub fn settle_won(
    storage: &mut dyn Storage,
    session_id: u64,
) -> Result<(Addr, Uint128), ContractError> {
    let mut session = SESSIONS.load(storage, session_id)?;
    if session.status != SessionStatus::Won {
        return Err(ContractError::NoPendingPayout);
    }

    let payout = session
        .stake
        .checked_mul(Uint128::from(PAYOUT_MULTIPLIER))
        .map_err(StdError::overflow)?;
    let treasury = TREASURY.load(storage)?;
    // reserved always covers this session's payout, the remainder is owed
    // to other won sessions and must stay covered after the retry
    let others_reserved = RESERVED.load(storage)? - payout;
    if payout > treasury.checked_sub(others_reserved).unwrap_or_default() {
        return Err(ContractError::InsufficientTreasury);
    }
    TREASURY.save(storage, &(treasury - payout))?;
    RESERVED.save(storage, &others_reserved)?;

    session.status = SessionStatus::Settled;
    SESSIONS.save(storage, session_id, &session)?;
    Ok((session.owner, payout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Session;
    use cosmwasm_std::testing::mock_dependencies;
    use cosmwasm_std::Timestamp;

    fn seed_session(storage: &mut dyn Storage, id: u64, number: u8, stake: u128) {
        SESSIONS
            .save(
                storage,
                id,
                &Session {
                    owner: Addr::unchecked("player"),
                    number,
                    stake: Uint128::new(stake),
                    status: SessionStatus::Pending,
                    created: Timestamp::from_seconds(1571797419),
                },
            )
            .unwrap();
    }

    fn seed_treasury(storage: &mut dyn Storage, treasury: u128, reserved: u128) {
        TREASURY.save(storage, &Uint128::new(treasury)).unwrap();
        RESERVED.save(storage, &Uint128::new(reserved)).unwrap();
    }

    #[test]
    fn outcome_is_deterministic_and_in_range() {
        // all zeros -> u64 0 -> outcome 1
        assert_eq!(outcome_from_randomness([0; 32], 4), 1);
        // only the first 8 bytes matter
        let mut tail_noise = [0; 32];
        tail_noise[31] = 0xff;
        assert_eq!(outcome_from_randomness(tail_noise, 4), 1);
        // value 5 mod 4 -> outcome 2
        let mut randomness = [0; 32];
        randomness[7] = 5;
        assert_eq!(outcome_from_randomness(randomness, 4), 2);
        // same value, larger bound
        assert_eq!(outcome_from_randomness(randomness, 10), 6);

        for b in 0..=255u8 {
            let mut randomness = [0; 32];
            randomness[7] = b;
            let outcome = outcome_from_randomness(randomness, 4);
            assert!((1..=4).contains(&outcome));
        }
    }

    #[test]
    fn losing_session_keeps_stake_in_treasury() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        seed_treasury(storage, 1_000, 0);
        seed_session(storage, 1, 2, 100);

        // all-zero randomness gives outcome 1, guess was 2
        let resolution = resolve_session(storage, 1, [0; 32], 4).unwrap();
        assert_eq!(resolution.status, SessionStatus::Lost);
        assert_eq!(resolution.payout, Uint128::zero());
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::new(1_000));
        assert_eq!(
            SESSIONS.load(storage, 1).unwrap().status,
            SessionStatus::Lost
        );
    }

    #[test]
    fn winning_session_is_paid_from_treasury() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        seed_treasury(storage, 1_000, 0);
        seed_session(storage, 1, 1, 100);

        let resolution = resolve_session(storage, 1, [0; 32], 4).unwrap();
        assert_eq!(resolution.status, SessionStatus::Settled);
        assert!(resolution.paid);
        assert_eq!(resolution.payout, Uint128::new(300));
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::new(700));
        assert_eq!(RESERVED.load(storage).unwrap(), Uint128::zero());
    }

    #[test]
    fn short_treasury_defers_payout() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        seed_treasury(storage, 100, 0);
        seed_session(storage, 1, 1, 100);

        let resolution = resolve_session(storage, 1, [0; 32], 4).unwrap();
        assert_eq!(resolution.status, SessionStatus::Won);
        assert!(!resolution.paid);
        // stake stays until the retry, the payout is reserved
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::new(100));
        assert_eq!(RESERVED.load(storage).unwrap(), Uint128::new(300));

        // retry still short
        let err = settle_won(storage, 1).unwrap_err();
        assert_eq!(err, ContractError::InsufficientTreasury);

        // top up, then the retry pays without re-deriving randomness
        deposit(storage, Uint128::new(500)).unwrap();
        let (owner, payout) = settle_won(storage, 1).unwrap();
        assert_eq!(owner, Addr::unchecked("player"));
        assert_eq!(payout, Uint128::new(300));
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::new(300));
        assert_eq!(RESERVED.load(storage).unwrap(), Uint128::zero());
        assert_eq!(
            SESSIONS.load(storage, 1).unwrap().status,
            SessionStatus::Settled
        );

        // a settled session cannot be paid again
        let err = settle_won(storage, 1).unwrap_err();
        assert_eq!(err, ContractError::NoPendingPayout);
    }

    #[test]
    fn win_never_pays_from_reserved_funds() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        // 300 of the 400 are owed to an earlier won session, the new 300
        // payout is not covered by the unreserved 100
        seed_treasury(storage, 400, 300);
        seed_session(storage, 2, 1, 100);

        let resolution = resolve_session(storage, 2, [0; 32], 4).unwrap();
        assert_eq!(resolution.status, SessionStatus::Won);
        assert!(!resolution.paid);
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::new(400));
        assert_eq!(RESERVED.load(storage).unwrap(), Uint128::new(600));
    }

    #[test]
    fn retry_cannot_spend_other_sessions_reservations() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        seed_treasury(storage, 100, 0);
        seed_session(storage, 1, 1, 100);
        seed_session(storage, 2, 1, 100);

        // both wins defer, 600 is owed in total
        resolve_session(storage, 1, [0; 32], 4).unwrap();
        resolve_session(storage, 2, [0; 32], 4).unwrap();
        assert_eq!(RESERVED.load(storage).unwrap(), Uint128::new(600));

        // 400 covers one payout in isolation but not on top of the other
        // session's 300 reservation
        deposit(storage, Uint128::new(300)).unwrap();
        let err = settle_won(storage, 1).unwrap_err();
        assert_eq!(err, ContractError::InsufficientTreasury);

        deposit(storage, Uint128::new(200)).unwrap();
        let (_, payout) = settle_won(storage, 1).unwrap();
        assert_eq!(payout, Uint128::new(300));
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::new(300));
        assert_eq!(RESERVED.load(storage).unwrap(), Uint128::new(300));

        let (_, payout) = settle_won(storage, 2).unwrap();
        assert_eq!(payout, Uint128::new(300));
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::zero());
        assert_eq!(RESERVED.load(storage).unwrap(), Uint128::zero());
    }

    #[test]
    fn resolution_happens_exactly_once() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        seed_treasury(storage, 1_000, 0);
        seed_session(storage, 1, 2, 100);

        resolve_session(storage, 1, [0; 32], 4).unwrap();
        let err = resolve_session(storage, 1, [0; 32], 4).unwrap_err();
        assert_eq!(err, ContractError::SessionAlreadyResolved);
    }

    #[test]
    fn withdraw_never_touches_reserved_funds() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        seed_treasury(storage, 500, 300);

        let err = withdraw(storage, Uint128::new(201)).unwrap_err();
        assert_eq!(err, ContractError::InsufficientTreasury);

        withdraw(storage, Uint128::new(200)).unwrap();
        assert_eq!(TREASURY.load(storage).unwrap(), Uint128::new(300));

        // reserved can exceed the balance after a deferred win, nothing is withdrawable then
        seed_treasury(storage, 100, 300);
        assert_eq!(unreserved(storage).unwrap(), Uint128::zero());
        let err = withdraw(storage, Uint128::new(1)).unwrap_err();
        assert_eq!(err, ContractError::InsufficientTreasury);
    }
}
