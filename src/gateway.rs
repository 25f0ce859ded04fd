//! Randomness Gateway: turns "session S needs an outcome" into an oracle
//! request and turns the oracle's asynchronous callback back into a session
//! id. Owns the pending-request bookkeeping, nothing else.

use cosmwasm_std::{to_binary, Storage, WasmMsg};
use nois::ProxyExecuteMsg;

use crate::error::ContractError;
use crate::state::{Config, PENDING_REQUESTS};

const REQUEST_ID_PREFIX: &str = "guess-";

/// The request id doubles as the proxy job id, so the callback carries it back.
pub fn request_id(session_id: u64) -> String {
    format!("{REQUEST_ID_PREFIX}{session_id}")
}

/// Records a pending request for the session and builds the proxy message.
/// At most one request may be in flight per session.
pub fn request_randomness(
    storage: &mut dyn Storage,
    config: &Config,
    session_id: u64,
) -> Result<(String, WasmMsg), ContractError> {
    let oracle = config
        .oracle
        .as_ref()
        .ok_or(ContractError::OracleUnavailable)?;

    let request_id = request_id(session_id);
    if PENDING_REQUESTS.has(storage, &request_id) {
        return Err(ContractError::RequestAlreadyPending);
    }
    PENDING_REQUESTS.save(storage, &request_id, &session_id)?;

    let msg = WasmMsg::Execute {
        contract_addr: oracle.to_string(),
        // GetNextRandomness requests the randomness from the proxy
        // The job id is needed to know what randomness we are referring to upon reception in the callback.
        msg: to_binary(&ProxyExecuteMsg::GetNextRandomness {
            job_id: request_id.clone(),
        })?,
        funds: vec![],
    };

    Ok((request_id, msg))
}

/// Consumes the pending entry for a request id and returns its session id.
/// The entry is removed before resolution runs, so a duplicate or forged
/// callback can never resolve a session twice.
pub fn take_pending(storage: &mut dyn Storage, request_id: &str) -> Result<u64, ContractError> {
    let session_id = PENDING_REQUESTS
        .may_load(storage, request_id)?
        .ok_or(ContractError::UnknownRequest)?;
    PENDING_REQUESTS.remove(storage, request_id);
    Ok(session_id)
}
