//! Transaction model of the host chain: wire encoding, signature hashing,
//! key handling and input signing.

pub mod constants;
pub mod hashing;
pub mod keys;
pub mod sign;
pub mod tx;
