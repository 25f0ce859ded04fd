use thiserror::Error;

use cosmwasm_std::StdError;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("Unauthorized.")]
    Unauthorized,

    #[error("Oracle address is not valid")]
    InvalidOracleAddress,

    #[error("Maximum guessable number must be at least 2")]
    InvalidMaxNumber,

    #[error("No oracle is configured, randomness cannot be requested")]
    OracleUnavailable,

    #[error("The session already has a randomness request in flight")]
    RequestAlreadyPending,

    // guards against stale or forged callbacks and against replays,
    // the pending entry for a request id is consumed exactly once
    #[error("No pending request found for this request id")]
    UnknownRequest,

    #[error("The session has already been resolved")]
    SessionAlreadyResolved,

    #[error("Could not open the session because the randomness request failed")]
    SessionCreationFailed,

    #[error("The treasury does not hold enough unreserved funds")]
    InsufficientTreasury,

    #[error("Deposits must carry a non-zero amount")]
    EmptyDeposit,

    #[error("A guess must be staked with a non-zero amount")]
    InvalidStake,

    #[error("Guessed {number} but only 1..={max_number} is playable")]
    GuessOutOfRange { number: u8, max_number: u8 },

    #[error("Invalid Payment")]
    InvalidPayment,

    #[error("Received invalid randomness")]
    InvalidRandomness,

    #[error("The session has no payout waiting to be settled")]
    NoPendingPayout,
}
