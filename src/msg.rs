use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{HexBinary, Timestamp, Uint128};
use nois::NoisCallback;

use crate::state::SessionStatus;

#[cw_serde]
pub struct InstantiateMsg {
    /// Address of the randomness oracle (nois proxy). The empty string
    /// deploys without an oracle, guesses cannot be resolved then.
    pub oracle: String,
    /// Oracle key identifier, stored as opaque bytes.
    pub key_id: HexBinary,
    /// Upper bound for guesses, defaults to 4. Must be at least 2.
    pub max_number: Option<u8>,
    /// Denom used for stakes, deposits and payouts.
    pub denom: String,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Top up the pooled balance. Open to any caller.
    Fund {},
    /// Submit a guess, staking the attached funds. This triggers fetching
    /// the unpredictable random beacon.
    Guess { number: u8 },
    // callback contains the randomness from drand (HexBinary) and job_id
    // callback should only be allowed to be called by the proxy contract
    NoisReceive { callback: NoisCallback },
    /// Settle a session that won while the treasury was short. The outcome
    /// is not re-derived, only the deferred payment is retried.
    PayoutWon { session_id: u64 },
    /// Withdraw unreserved funds to the given address (owner only).
    Withdraw { amount: Uint128, address: Option<String> },
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(ConfigResponse)]
    Config {},
    /// The current treasury balance.
    #[returns(BalanceResponse)]
    Balance {},
    /// Query one session's data
    #[returns(SessionResponse)]
    Session { id: u64 },
    /// Paginated listing of all sessions
    #[returns(SessionsResponse)]
    Sessions {
        start_after: Option<u64>,
        limit: Option<u32>,
    },
}

#[cw_serde]
pub struct ConfigResponse {
    pub owner: String,
    /// None when deployed without an oracle
    pub oracle: Option<String>,
    pub key_id: HexBinary,
    pub max_number: u8,
    pub denom: String,
}

#[cw_serde]
pub struct BalanceResponse {
    /// Aggregate pooled balance
    pub balance: Uint128,
    /// Portion owed to won-but-unpaid sessions
    pub reserved: Uint128,
}

#[cw_serde]
pub struct SessionResponse {
    // None means no such session
    pub session: Option<SessionDataResponse>,
}

#[cw_serde]
pub struct SessionDataResponse {
    pub id: u64,
    pub owner: String,
    pub number: u8,
    pub stake: Uint128,
    pub status: SessionStatus,
    pub created: Timestamp,
}

#[cw_serde]
pub struct SessionsResponse {
    pub sessions: Vec<SessionDataResponse>,
}
