mod money;

pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, BRL_CURRENCY_CODE, BRL_CURRENCY_CODE_LOWER};
pub use secret::Secret;
