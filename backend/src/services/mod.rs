pub mod admission;
pub mod authenticator;
