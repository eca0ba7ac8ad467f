use serde::{Deserialize, Serialize};

pub const SIG_HASH_ALL: SigHashType = SigHashType(0b0000_0001);
pub const SIG_HASH_NONE: SigHashType = SigHashType(0b0000_0010);
pub const SIG_HASH_SINGLE: SigHashType = SigHashType(0b0000_0011);
pub const SIG_HASH_FORKID: SigHashType = SigHashType(0b0100_0000);
pub const SIG_HASH_ANY_ONE_CAN_PAY: SigHashType = SigHashType(0b1000_0000);

/// The sighash type every signature produced by this workspace carries.
pub const SIG_HASH_ALL_FORKID: SigHashType = SigHashType(SIG_HASH_ALL.0 | SIG_HASH_FORKID.0);

/// SIG_HASH_MASK defines the number of bits of the hash type which are used
/// to identify which outputs are signed.
pub const SIG_HASH_MASK: u8 = 0b0001_1111;

const ALLOWED_SIG_HASH_TYPES_VALUES: [u8; 6] = [
    SIG_HASH_ALL.0 | SIG_HASH_FORKID.0,
    SIG_HASH_NONE.0 | SIG_HASH_FORKID.0,
    SIG_HASH_SINGLE.0 | SIG_HASH_FORKID.0,
    SIG_HASH_ALL.0 | SIG_HASH_FORKID.0 | SIG_HASH_ANY_ONE_CAN_PAY.0,
    SIG_HASH_NONE.0 | SIG_HASH_FORKID.0 | SIG_HASH_ANY_ONE_CAN_PAY.0,
    SIG_HASH_SINGLE.0 | SIG_HASH_FORKID.0 | SIG_HASH_ANY_ONE_CAN_PAY.0,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigHashType(pub(crate) u8);

impl SigHashType {
    pub fn is_sighash_all(self) -> bool {
        self.0 & SIG_HASH_MASK == SIG_HASH_ALL.0
    }

    pub fn is_sighash_none(self) -> bool {
        self.0 & SIG_HASH_MASK == SIG_HASH_NONE.0
    }

    pub fn is_sighash_single(self) -> bool {
        self.0 & SIG_HASH_MASK == SIG_HASH_SINGLE.0
    }

    pub fn is_sighash_anyone_can_pay(self) -> bool {
        self.0 & SIG_HASH_ANY_ONE_CAN_PAY.0 == SIG_HASH_ANY_ONE_CAN_PAY.0
    }

    pub fn has_fork_id(self) -> bool {
        self.0 & SIG_HASH_FORKID.0 == SIG_HASH_FORKID.0
    }

    pub fn to_u8(self) -> u8 {
        self.0
    }

    pub fn from_u8(val: u8) -> Result<Self, &'static str> {
        let hash_type = Self(val);
        if !hash_type.has_fork_id() {
            return Err("sighash type lacks the fork id flag");
        }
        if !ALLOWED_SIG_HASH_TYPES_VALUES.contains(&val) {
            return Err("invalid sighash type");
        }

        Ok(hash_type)
    }
}
