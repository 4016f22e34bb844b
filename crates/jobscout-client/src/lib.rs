pub mod cleaner;
pub mod exchange;

pub use cleaner::{HtmdCleaner, PlainTextCleaner, format_description};
pub use exchange::{PooledExchange, ReqwestExchangeFactory};
