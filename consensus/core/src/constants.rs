pub const TX_VERSION: u32 = 1;

/// Sequence value that disables lock-time enforcement for an input.
pub const MAX_TX_IN_SEQUENCE_NUM: u32 = u32::MAX;

/// Highest sequence value that still lets the transaction lock time apply.
pub const LOCK_TIME_ENABLED_SEQUENCE: u32 = MAX_TX_IN_SEQUENCE_NUM - 1;

/// Lock time values below this threshold are block heights, at or above it unix timestamps.
pub const LOCK_TIME_THRESHOLD: u32 = 500_000_000;

/// Outputs paying less than this many satoshis are considered dust.
pub const DEFAULT_DUST_THRESHOLD: u64 = 546;

pub mod size {
    //! Serialized size figures used for fee estimation.

    /// version (4) + input count (1) + output count (1) + lock time (4)
    pub const TX_OVERHEAD: usize = 10;

    /// A signed pay-to-pubkey-hash input with a compressed key and a worst case DER signature.
    pub const P2PKH_INPUT: usize = 148;

    /// outpoint (36) + script length (1) + sequence (4)
    pub const GENERIC_INPUT_OVERHEAD: usize = 41;

    /// value (8) + script length (1) + 25 byte pay-to-pubkey-hash script
    pub const P2PKH_OUTPUT: usize = 34;

    pub const OUTPUT_VALUE: usize = 8;

    pub const OUTPUT_COUNT: usize = 1;

    /// DER signature upper bound plus the sighash type byte.
    pub const MAX_SIGNATURE_WITH_HASH_TYPE: usize = 73;
}
