use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, HexBinary, Timestamp, Uint128};
use cw_storage_plus::{Item, Map};

#[cw_serde]
pub struct Config {
    /// The deployer. May withdraw unreserved treasury funds.
    pub owner: Addr,
    /// The randomness oracle allowed to fulfill requests. None is the
    /// degenerate test deployment where randomness never arrives and only
    /// the funding/balance behaviour is exercised.
    pub oracle: Option<Addr>,
    /// Opaque key identifier selecting the oracle's randomness configuration.
    pub key_id: HexBinary,
    /// Guesses are accepted in 1..=max_number.
    pub max_number: u8,
    /// Denom of the token used for stakes, deposits and payouts.
    pub denom: String,
}

#[cw_serde]
pub enum SessionStatus {
    /// Waiting for randomness.
    Pending,
    /// Resolved as a winner but not yet paid, the payout is reserved.
    Won,
    /// Winner paid out. Terminal.
    Settled,
    /// Guess did not match the outcome, the stake stays in the treasury. Terminal.
    Lost,
}

#[cw_serde]
pub struct Session {
    pub owner: Addr,
    /// The guessed number, validated against max_number on submission.
    pub number: u8,
    pub stake: Uint128,
    pub status: SessionStatus,
    pub created: Timestamp,
}

pub const CONFIG_KEY: &str = "config";
pub const CONFIG: Item<Config> = Item::new(CONFIG_KEY);

/// Aggregate contract balance. Mutated only through the engine's
/// accounting helpers so the balance invariant holds after every call.
pub const TREASURY: Item<Uint128> = Item::new("treasury");

/// Sum owed to sessions that won while the treasury was short.
pub const RESERVED: Item<Uint128> = Item::new("reserved");

pub const NEXT_SESSION_ID: Item<u64> = Item::new("next_session_id");

/// A map that stores every guess session by id.
pub const SESSIONS: Map<u64, Session> = Map::new("s");

/// Outstanding randomness requests: request id -> session id. Written and
/// consumed exclusively by the gateway, one live entry per session at most.
pub const PENDING_REQUESTS: Map<&str, u64> = Map::new("pr");
