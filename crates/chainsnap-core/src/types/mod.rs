//! 핵심 타입 정의.

pub mod contract;
pub mod decimal;

pub use contract::{ContractViolation, Greeks, OptionContract, OptionType};
pub use decimal::Price;
