use cosmwasm_std::{
    ensure_eq, entry_point, to_binary, Attribute, BankMsg, Coin, CosmosMsg, Deps, DepsMut, Env,
    MessageInfo, Order, QueryResponse, Response, StdResult, Uint128,
};
use cw_storage_plus::Bound;

use crate::engine;
use crate::error::ContractError;
use crate::gateway;
use crate::msg::{
    BalanceResponse, ConfigResponse, ExecuteMsg, InstantiateMsg, QueryMsg, SessionDataResponse,
    SessionResponse, SessionsResponse,
};
use crate::state::{
    Config, Session, SessionStatus, CONFIG, NEXT_SESSION_ID, RESERVED, SESSIONS, TREASURY,
};

const CONTRACT_NAME: &str = "crates.io:num-guesser";
const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Used when the instantiation message leaves the bound unset.
const DEFAULT_MAX_NUMBER: u8 = 4;

const DEFAULT_QUERY_LIMIT: u32 = 50;
const MAX_QUERY_LIMIT: u32 = 100;

#[entry_point]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    cw2::set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    // An empty oracle address is the degenerate deployment used to exercise
    // funding behaviour. Randomness can never arrive in that configuration.
    let oracle = if msg.oracle.is_empty() {
        None
    } else {
        Some(
            deps.api
                .addr_validate(&msg.oracle)
                .map_err(|_| ContractError::InvalidOracleAddress)?,
        )
    };
    let max_number = msg.max_number.unwrap_or(DEFAULT_MAX_NUMBER);
    if max_number < 2 {
        return Err(ContractError::InvalidMaxNumber);
    }

    let config = Config {
        owner: info.sender,
        oracle,
        key_id: msg.key_id,
        max_number,
        denom: msg.denom,
    };
    CONFIG.save(deps.storage, &config)?;
    TREASURY.save(deps.storage, &Uint128::zero())?;
    RESERVED.save(deps.storage, &Uint128::zero())?;
    NEXT_SESSION_ID.save(deps.storage, &0)?;

    Ok(Response::default())
}

#[entry_point]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        ExecuteMsg::Fund {} => execute_fund(deps, info),
        ExecuteMsg::Guess { number } => execute_guess(deps, env, info, number),
        // NoisReceive should be called by the proxy contract. The proxy is forwarding the randomness from the nois chain to this contract.
        ExecuteMsg::NoisReceive { callback } => execute_receive(deps, env, info, callback),
        ExecuteMsg::PayoutWon { session_id } => execute_payout_won(deps, session_id),
        ExecuteMsg::Withdraw { amount, address } => execute_withdraw(deps, info, amount, address),
    }
}

#[entry_point]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<QueryResponse> {
    let response = match msg {
        QueryMsg::Config {} => to_binary(&query_config(deps)?)?,
        QueryMsg::Balance {} => to_binary(&query_balance(deps)?)?,
        QueryMsg::Session { id } => to_binary(&query_session(deps, id)?)?,
        QueryMsg::Sessions { start_after, limit } => {
            to_binary(&query_sessions(deps, start_after, limit)?)?
        }
    };
    Ok(response)
}

/// Sums the attached funds in the staking denom. Any foreign coin aborts.
fn paid_amount(info: &MessageInfo, denom: &str) -> Result<Uint128, ContractError> {
    let mut amount = Uint128::zero();
    for coin in &info.funds {
        if coin.denom != denom {
            return Err(ContractError::InvalidPayment);
        }
        amount += coin.amount;
    }
    Ok(amount)
}

fn status_label(status: &SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "pending",
        SessionStatus::Won => "won",
        SessionStatus::Settled => "settled",
        SessionStatus::Lost => "lost",
    }
}

fn execute_fund(deps: DepsMut, info: MessageInfo) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let amount = paid_amount(&info, &config.denom)?;
    if amount.is_zero() {
        return Err(ContractError::EmptyDeposit);
    }
    let balance = engine::deposit(deps.storage, amount)?;

    Ok(Response::new().add_attributes(vec![
        Attribute::new("action", "fund"),
        Attribute::new("sender", info.sender),
        Attribute::new("amount", amount),
        Attribute::new("balance", balance),
    ]))
}

// Opens a session and asks the oracle for the randomness that will decide it
fn execute_guess(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    number: u8,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;

    if number < 1 || number > config.max_number {
        return Err(ContractError::GuessOutOfRange {
            number,
            max_number: config.max_number,
        });
    }
    let stake = paid_amount(&info, &config.denom)?;
    if stake.is_zero() {
        return Err(ContractError::InvalidStake);
    }

    let session_id = NEXT_SESSION_ID.load(deps.storage)? + 1;
    // No session may come to life if the randomness that decides it cannot
    // be requested.
    let (request_id, request_msg) =
        gateway::request_randomness(deps.storage, &config, session_id)
            .map_err(|_| ContractError::SessionCreationFailed)?;

    NEXT_SESSION_ID.save(deps.storage, &session_id)?;
    SESSIONS.save(
        deps.storage,
        session_id,
        &Session {
            owner: info.sender.clone(),
            number,
            stake,
            status: SessionStatus::Pending,
            created: env.block.time,
        },
    )?;
    engine::deposit(deps.storage, stake)?;

    Ok(Response::new()
        .add_message(request_msg)
        .add_attributes(vec![
            Attribute::new("action", "guess"),
            Attribute::new("sender", info.sender),
            Attribute::new("session_id", session_id.to_string()),
            Attribute::new("number", number.to_string()),
            Attribute::new("stake", stake),
            Attribute::new("request_id", request_id),
        ]))
}

fn execute_receive(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    callback: nois::NoisCallback,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;

    // callback should only be allowed to be called by the proxy contract
    // otherwise anyone can cut the randomness workflow and cheat the randomness by sending the randomness directly to this contract
    let oracle = config.oracle.clone().ok_or(ContractError::Unauthorized)?;
    ensure_eq!(info.sender, oracle, ContractError::Unauthorized);

    let randomness: [u8; 32] = callback
        .randomness
        .to_array()
        .map_err(|_| ContractError::InvalidRandomness)?;

    // The pending entry is consumed before resolution runs, a second
    // callback for the same request id can never resolve anything.
    let job_id = callback.job_id;
    let session_id = gateway::take_pending(deps.storage, &job_id)?;
    let resolution = engine::resolve_session(deps.storage, session_id, randomness, config.max_number)?;

    let mut msgs = Vec::<CosmosMsg>::new();
    if resolution.paid {
        msgs.push(
            BankMsg::Send {
                to_address: resolution.owner.to_string(),
                amount: vec![Coin {
                    amount: resolution.payout,
                    denom: config.denom.clone(),
                }],
            }
            .into(),
        );
    }

    Ok(Response::new().add_messages(msgs).add_attributes(vec![
        Attribute::new("action", "receive-randomness-and-resolve"),
        Attribute::new("request_id", job_id),
        Attribute::new("session_id", session_id.to_string()),
        Attribute::new("outcome", resolution.outcome.to_string()),
        Attribute::new("status", status_label(&resolution.status)),
        Attribute::new(
            "payout",
            Coin {
                amount: resolution.payout,
                denom: config.denom,
            }
            .to_string(),
        ),
    ]))
}

fn execute_payout_won(deps: DepsMut, session_id: u64) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let (winner, payout) = engine::settle_won(deps.storage, session_id)?;

    Ok(Response::new()
        .add_message(BankMsg::Send {
            to_address: winner.to_string(),
            amount: vec![Coin {
                amount: payout,
                denom: config.denom.clone(),
            }],
        })
        .add_attributes(vec![
            Attribute::new("action", "payout-won"),
            Attribute::new("session_id", session_id.to_string()),
            Attribute::new("winner", winner),
            Attribute::new(
                "payout",
                Coin {
                    amount: payout,
                    denom: config.denom,
                }
                .to_string(),
            ),
        ]))
}

fn execute_withdraw(
    deps: DepsMut,
    info: MessageInfo,
    amount: Uint128,
    address: Option<String>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    // check the calling address is the authorised owner
    ensure_eq!(info.sender, config.owner, ContractError::Unauthorized);

    let recipient = match address {
        Some(addr) => deps.api.addr_validate(&addr)?,
        None => config.owner,
    };
    engine::withdraw(deps.storage, amount)?;

    Ok(Response::new()
        .add_message(BankMsg::Send {
            to_address: recipient.to_string(),
            amount: vec![Coin {
                amount,
                denom: config.denom.clone(),
            }],
        })
        .add_attributes(vec![
            Attribute::new("action", "withdraw"),
            Attribute::new("recipient", recipient),
            Attribute::new(
                "amount",
                Coin {
                    amount,
                    denom: config.denom,
                }
                .to_string(),
            ),
        ]))
}

fn query_config(deps: Deps) -> StdResult<ConfigResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(ConfigResponse {
        owner: config.owner.into(),
        oracle: config.oracle.map(|o| o.into()),
        key_id: config.key_id,
        max_number: config.max_number,
        denom: config.denom,
    })
}

fn query_balance(deps: Deps) -> StdResult<BalanceResponse> {
    Ok(BalanceResponse {
        balance: TREASURY.load(deps.storage)?,
        reserved: RESERVED.load(deps.storage)?,
    })
}

fn session_data(id: u64, session: Session) -> SessionDataResponse {
    SessionDataResponse {
        id,
        owner: session.owner.into(),
        number: session.number,
        stake: session.stake,
        status: session.status,
        created: session.created,
    }
}

fn query_session(deps: Deps, id: u64) -> StdResult<SessionResponse> {
    let session = SESSIONS.may_load(deps.storage, id)?;
    Ok(SessionResponse {
        session: session.map(|s| session_data(id, s)),
    })
}

fn query_sessions(
    deps: Deps,
    start_after: Option<u64>,
    limit: Option<u32>,
) -> StdResult<SessionsResponse> {
    let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT).min(MAX_QUERY_LIMIT) as usize;
    let start = start_after.map(Bound::exclusive);
    let sessions = SESSIONS
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|item| {
            let (id, session) = item?;
            Ok(session_data(id, session))
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(SessionsResponse { sessions })
}
