pub mod contract;
pub mod engine;
mod error;
pub mod gateway;
pub mod msg;
pub mod state;

pub use crate::error::ContractError;
