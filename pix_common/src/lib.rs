mod cents;

pub mod helpers;
pub mod op;
mod secret;
pub mod signature;

pub use cents::{Cents, CentsConversionError, BRL_CURRENCY_CODE};
pub use secret::Secret;
