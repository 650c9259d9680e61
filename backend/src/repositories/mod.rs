pub mod session;
pub mod transaction;

pub use transaction::*;
