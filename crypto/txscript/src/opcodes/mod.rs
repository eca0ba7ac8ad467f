#[macro_use]
mod macros;

use crate::data_stack::{DataStack, OpcodeData, minimally_encode};
use crate::{MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_NUM_LEN, NO_COST_OPCODE, TxScriptEngine, TxScriptError};
use core::cmp::{max, min};
use core::mem::size_of;
use lockbox_consensus_core::tx::VerifiableTransaction;
use std::fmt::{Debug, Formatter};

/// First value in the range formed by OpData# opcodes (where opcode == value)
pub const OP_DATA_MIN_VAL: u8 = self::codes::OpData1;
/// Last value in the range formed by OpData# opcodes (where opcode == value)
pub const OP_DATA_MAX_VAL: u8 = self::codes::OpData75;

#[derive(PartialEq, Eq)]
pub(crate) enum OpCond {
    False,
    True,
    Skip,
}

impl OpCond {
    pub fn negate(&self) -> OpCond {
        match self {
            OpCond::True => OpCond::False,
            OpCond::False => OpCond::True,
            OpCond::Skip => OpCond::Skip,
        }
    }
}

type OpCodeResult = Result<(), TxScriptError>;

pub struct OpCode<const CODE: u8> {
    data: Vec<u8>,
}

impl<const CODE: u8> Debug for OpCode<CODE> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Opcode<{:#2x}>{{ data:{:?} }}", CODE, self.data)
    }
}

pub trait OpCodeMetadata: Debug {
    // Opcode number
    fn value(&self) -> u8;
    // length of data
    fn len(&self) -> usize;
    // Conditional should be executed also is not in branch
    fn is_conditional(&self) -> bool;

    fn is_push_opcode(&self) -> bool;
    fn get_data(&self) -> &[u8];

    // Disabled opcodes fail the script even in an unexecuted branch
    fn is_disabled(&self) -> bool;
    fn always_illegal(&self) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait OpCodeExecution<T: VerifiableTransaction> {
    fn empty() -> Result<Box<dyn OpCodeImplementation<T>>, TxScriptError>
    where
        Self: Sized;
    #[allow(clippy::new_ret_no_self)]
    fn new(data: Vec<u8>) -> Result<Box<dyn OpCodeImplementation<T>>, TxScriptError>
    where
        Self: Sized;

    fn execute(&self, vm: &mut TxScriptEngine<T>) -> OpCodeResult;
}

pub trait OpcodeSerialization {
    fn serialize(&self) -> Vec<u8>;
    fn deserialize<'i, I: Iterator<Item = &'i u8>, T: VerifiableTransaction>(
        it: &mut I,
    ) -> Result<Box<dyn OpCodeImplementation<T>>, TxScriptError>
    where
        Self: Sized;
}

pub trait OpCodeImplementation<T: VerifiableTransaction>: OpCodeExecution<T> + OpCodeMetadata + OpcodeSerialization {}

impl<const CODE: u8> OpCodeMetadata for OpCode<CODE> {
    fn value(&self) -> u8 {
        CODE
    }

    fn is_push_opcode(&self) -> bool {
        CODE <= NO_COST_OPCODE
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn is_conditional(&self) -> bool {
        (codes::OpIf..=codes::OpEndIf).contains(&self.value())
    }

    fn get_data(&self) -> &[u8] {
        &self.data
    }

    fn is_disabled(&self) -> bool {
        matches!(CODE, codes::Op2Mul | codes::Op2Div)
    }

    fn always_illegal(&self) -> bool {
        matches!(CODE, codes::OpVerIf | codes::OpVerNotIf)
    }
}

// Helpers for some opcodes with shared data
#[inline]
fn push_data<T: VerifiableTransaction>(data: Vec<u8>, vm: &mut TxScriptEngine<T>) -> OpCodeResult {
    vm.dstack.push(data);
    Ok(())
}

#[inline]
fn push_number<T: VerifiableTransaction>(number: i64, vm: &mut TxScriptEngine<T>) -> OpCodeResult {
    vm.dstack.push_item(number);
    Ok(())
}

#[inline]
fn verify<T: VerifiableTransaction>(vm: &mut TxScriptEngine<T>) -> OpCodeResult {
    let [valid]: [bool; 1] = vm.dstack.pop_items()?;
    match valid {
        true => Ok(()),
        false => Err(TxScriptError::VerifyError),
    }
}

#[inline]
fn hash_top<T: VerifiableTransaction, H: AsRef<[u8]>>(vm: &mut TxScriptEngine<T>, hash: fn(&[u8]) -> H) -> OpCodeResult {
    let [last] = vm.dstack.pop_raw()?;
    vm.dstack.push(hash(&last).as_ref().to_vec());
    Ok(())
}

fn bitwise<T: VerifiableTransaction>(vm: &mut TxScriptEngine<T>, op: fn(u8, u8) -> u8) -> OpCodeResult {
    let [a, b] = vm.dstack.pop_raw()?;
    if a.len() != b.len() {
        return Err(TxScriptError::OperandSizeMismatch(a.len(), b.len()));
    }
    vm.dstack.push(a.iter().zip(b.iter()).map(|(x, y)| op(*x, *y)).collect());
    Ok(())
}

/// Byte-array shift: the element is read as one big-endian bit string and its size is kept.
fn shift_left(data: &[u8], bits: usize) -> Vec<u8> {
    let (byte_shift, bit_shift) = (bits / 8, (bits % 8) as u32);
    (0..data.len())
        .map(|i| {
            let Some(&current) = data.get(i + byte_shift) else { return 0 };
            let carry = match data.get(i + byte_shift + 1) {
                Some(&next) if bit_shift > 0 => next >> (8 - bit_shift),
                _ => 0,
            };
            (current << bit_shift) | carry
        })
        .collect()
}

fn shift_right(data: &[u8], bits: usize) -> Vec<u8> {
    let (byte_shift, bit_shift) = (bits / 8, (bits % 8) as u32);
    (0..data.len())
        .map(|i| {
            let Some(k) = i.checked_sub(byte_shift) else { return 0 };
            let carry = match k.checked_sub(1) {
                Some(prev) if bit_shift > 0 => data[prev] << (8 - bit_shift),
                _ => 0,
            };
            (data[k] >> bit_shift) | carry
        })
        .collect()
}

fn shift<T: VerifiableTransaction>(vm: &mut TxScriptEngine<T>, shifter: fn(&[u8], usize) -> Vec<u8>) -> OpCodeResult {
    let [n]: [i64; 1] = vm.dstack.pop_items()?;
    if n < 0 {
        return Err(TxScriptError::InvalidState(format!("shift by a negative amount {n}")));
    }
    let [data] = vm.dstack.pop_raw()?;
    vm.dstack.push(shifter(&data, n as usize));
    Ok(())
}

fn stack_index(loc: i32, len: usize) -> Result<usize, TxScriptError> {
    match usize::try_from(loc) {
        Ok(loc) if loc < len => Ok(len - loc - 1),
        Ok(loc) => Err(TxScriptError::InvalidStackOperation(loc + 1, len)),
        Err(_) => Err(TxScriptError::InvalidState("pick at a negative value".to_string())),
    }
}

/*
The following is the implementation and metadata of all opcodes. Each opcode has unique
number (and template system makes it impossible to use two opcodes), length specification,
display name and execution code.

The syntax is as follows:
```
opcode OpCodeName<id, length, "OP_NAME">(self, vm) {
    code;
    output
}
// OR
opcode OpCodeName<id, length, "OP_NAME">(self, vm) statement

// in case of an opcode alias
opcode |OpCodeAlias| OpCodeName<id, length, "OP_NAME">(self, vm) {
    code;
    output
}
```

Length specification is either a number (for fixed length) or a unsigned integer type
(for var length).
The execution code is implementing OpCodeImplementation. You can access the engine using the `vm`
variable.

Implementation details in `opcodes/macros.rs`.
*/
opcode_list! {

    // Data push opcodes.
    opcode |Op0| OpFalse<0x00, 1, "OP_0">(self , vm) {
        vm.dstack.push(vec![]);
        Ok(())
    }

    opcode OpData1<0x01, 2, "OP_DATA_1">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData2<0x02, 3, "OP_DATA_2">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData3<0x03, 4, "OP_DATA_3">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData4<0x04, 5, "OP_DATA_4">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData5<0x05, 6, "OP_DATA_5">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData6<0x06, 7, "OP_DATA_6">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData7<0x07, 8, "OP_DATA_7">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData8<0x08, 9, "OP_DATA_8">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData9<0x09, 10, "OP_DATA_9">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData10<0x0a, 11, "OP_DATA_10">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData11<0x0b, 12, "OP_DATA_11">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData12<0x0c, 13, "OP_DATA_12">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData13<0x0d, 14, "OP_DATA_13">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData14<0x0e, 15, "OP_DATA_14">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData15<0x0f, 16, "OP_DATA_15">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData16<0x10, 17, "OP_DATA_16">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData17<0x11, 18, "OP_DATA_17">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData18<0x12, 19, "OP_DATA_18">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData19<0x13, 20, "OP_DATA_19">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData20<0x14, 21, "OP_DATA_20">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData21<0x15, 22, "OP_DATA_21">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData22<0x16, 23, "OP_DATA_22">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData23<0x17, 24, "OP_DATA_23">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData24<0x18, 25, "OP_DATA_24">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData25<0x19, 26, "OP_DATA_25">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData26<0x1a, 27, "OP_DATA_26">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData27<0x1b, 28, "OP_DATA_27">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData28<0x1c, 29, "OP_DATA_28">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData29<0x1d, 30, "OP_DATA_29">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData30<0x1e, 31, "OP_DATA_30">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData31<0x1f, 32, "OP_DATA_31">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData32<0x20, 33, "OP_DATA_32">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData33<0x21, 34, "OP_DATA_33">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData34<0x22, 35, "OP_DATA_34">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData35<0x23, 36, "OP_DATA_35">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData36<0x24, 37, "OP_DATA_36">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData37<0x25, 38, "OP_DATA_37">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData38<0x26, 39, "OP_DATA_38">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData39<0x27, 40, "OP_DATA_39">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData40<0x28, 41, "OP_DATA_40">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData41<0x29, 42, "OP_DATA_41">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData42<0x2a, 43, "OP_DATA_42">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData43<0x2b, 44, "OP_DATA_43">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData44<0x2c, 45, "OP_DATA_44">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData45<0x2d, 46, "OP_DATA_45">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData46<0x2e, 47, "OP_DATA_46">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData47<0x2f, 48, "OP_DATA_47">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData48<0x30, 49, "OP_DATA_48">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData49<0x31, 50, "OP_DATA_49">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData50<0x32, 51, "OP_DATA_50">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData51<0x33, 52, "OP_DATA_51">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData52<0x34, 53, "OP_DATA_52">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData53<0x35, 54, "OP_DATA_53">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData54<0x36, 55, "OP_DATA_54">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData55<0x37, 56, "OP_DATA_55">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData56<0x38, 57, "OP_DATA_56">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData57<0x39, 58, "OP_DATA_57">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData58<0x3a, 59, "OP_DATA_58">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData59<0x3b, 60, "OP_DATA_59">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData60<0x3c, 61, "OP_DATA_60">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData61<0x3d, 62, "OP_DATA_61">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData62<0x3e, 63, "OP_DATA_62">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData63<0x3f, 64, "OP_DATA_63">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData64<0x40, 65, "OP_DATA_64">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData65<0x41, 66, "OP_DATA_65">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData66<0x42, 67, "OP_DATA_66">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData67<0x43, 68, "OP_DATA_67">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData68<0x44, 69, "OP_DATA_68">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData69<0x45, 70, "OP_DATA_69">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData70<0x46, 71, "OP_DATA_70">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData71<0x47, 72, "OP_DATA_71">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData72<0x48, 73, "OP_DATA_72">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData73<0x49, 74, "OP_DATA_73">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData74<0x4a, 75, "OP_DATA_74">(self, vm) push_data(self.data.clone(), vm)
    opcode OpData75<0x4b, 76, "OP_DATA_75">(self, vm) push_data(self.data.clone(), vm)
    opcode OpPushData1<0x4c, u8, "OP_PUSHDATA1">(self, vm) push_data(self.data.clone(), vm)
    opcode OpPushData2<0x4d, u16, "OP_PUSHDATA2">(self, vm) push_data(self.data.clone(), vm)
    opcode OpPushData4<0x4e, u32, "OP_PUSHDATA4">(self, vm) push_data(self.data.clone(), vm)

    opcode Op1Negate<0x4f, 1, "OP_1NEGATE">(self, vm) push_number(-1, vm)

    opcode OpReserved<0x50, 1, "OP_RESERVED">(self, vm) Err(TxScriptError::OpcodeReserved(format!("{self:?}")))

    opcode |Op1| OpTrue<0x51, 1, "OP_1">(self, vm) push_number(1, vm)
    opcode Op2<0x52, 1, "OP_2">(self, vm) push_number(2, vm)
    opcode Op3<0x53, 1, "OP_3">(self, vm) push_number(3, vm)
    opcode Op4<0x54, 1, "OP_4">(self, vm) push_number(4, vm)
    opcode Op5<0x55, 1, "OP_5">(self, vm) push_number(5, vm)
    opcode Op6<0x56, 1, "OP_6">(self, vm) push_number(6, vm)
    opcode Op7<0x57, 1, "OP_7">(self, vm) push_number(7, vm)
    opcode Op8<0x58, 1, "OP_8">(self, vm) push_number(8, vm)
    opcode Op9<0x59, 1, "OP_9">(self, vm) push_number(9, vm)
    opcode Op10<0x5a, 1, "OP_10">(self, vm) push_number(10, vm)
    opcode Op11<0x5b, 1, "OP_11">(self, vm) push_number(11, vm)
    opcode Op12<0x5c, 1, "OP_12">(self, vm) push_number(12, vm)
    opcode Op13<0x5d, 1, "OP_13">(self, vm) push_number(13, vm)
    opcode Op14<0x5e, 1, "OP_14">(self, vm) push_number(14, vm)
    opcode Op15<0x5f, 1, "OP_15">(self, vm) push_number(15, vm)
    opcode Op16<0x60, 1, "OP_16">(self, vm) push_number(16, vm)

    // Control opcodes.
    opcode OpNop<0x61, 1, "OP_NOP">(self, vm) Ok(())
    opcode OpVer<0x62, 1, "OP_VER">(self, vm) Err(TxScriptError::OpcodeReserved(format!("{self:?}")))

    opcode OpIf<0x63, 1, "OP_IF">(self, vm) {
        let mut cond = OpCond::Skip;
        if vm.is_executing() {
            let [condition]: [bool; 1] = vm.dstack.pop_items()?;
            cond = if condition { OpCond::True } else { OpCond::False };
        }
        vm.cond_stack.push(cond);
        Ok(())
    }

    opcode OpNotIf<0x64, 1, "OP_NOTIF">(self, vm) {
        let mut cond = OpCond::Skip;
        if vm.is_executing() {
            let [condition]: [bool; 1] = vm.dstack.pop_items()?;
            cond = if condition { OpCond::False } else { OpCond::True };
        }
        vm.cond_stack.push(cond);
        Ok(())
    }

    opcode OpVerIf<0x65, 1, "OP_VERIF">(self, vm) Err(TxScriptError::OpcodeReserved(format!("{self:?}")))
    opcode OpVerNotIf<0x66, 1, "OP_VERNOTIF">(self, vm) Err(TxScriptError::OpcodeReserved(format!("{self:?}")))

    opcode OpElse<0x67, 1, "OP_ELSE">(self, vm) {
        if let Some(cond) = vm.cond_stack.last_mut() {
            *cond = cond.negate();
            Ok(())
        } else {
            Err(TxScriptError::InvalidState("condition stack empty".to_string()))
        }
    }

    opcode OpEndIf<0x68, 1, "OP_ENDIF">(self, vm) {
        match vm.cond_stack.pop() {
            None => Err(TxScriptError::InvalidState("condition stack empty".to_string())),
            _ => Ok(())
        }
    }

    opcode OpVerify<0x69, 1, "OP_VERIFY">(self, vm) verify(vm)

    opcode OpReturn<0x6a, 1, "OP_RETURN">(self, vm) Err(TxScriptError::EarlyReturn)

    // Stack opcodes.
    opcode OpToAltStack<0x6b, 1, "OP_TOALTSTACK">(self, vm) {
        let [item] = vm.dstack.pop_raw()?;
        vm.astack.push(item);
        Ok(())
    }

    opcode OpFromAltStack<0x6c, 1, "OP_FROMALTSTACK">(self, vm) {
        match vm.astack.pop() {
            Some(last) => {
                vm.dstack.push(last);
                Ok(())
            },
            None => Err(TxScriptError::EmptyStack)
        }
    }

    opcode Op2Drop<0x6d, 1, "OP_2DROP">(self, vm) vm.dstack.drop_items::<2>()
    opcode Op2Dup<0x6e, 1, "OP_2DUP">(self, vm) vm.dstack.dup_items::<2>()
    opcode Op3Dup<0x6f, 1, "OP_3DUP">(self, vm) vm.dstack.dup_items::<3>()
    opcode Op2Over<0x70, 1, "OP_2OVER">(self, vm) vm.dstack.over_items::<2>()
    opcode Op2Rot<0x71, 1, "OP_2ROT">(self, vm) vm.dstack.rot_items::<2>()
    opcode Op2Swap<0x72, 1, "OP_2SWAP">(self, vm) vm.dstack.swap_items::<2>()

    opcode OpIfDup<0x73, 1, "OP_IFDUP">(self, vm) {
        let [result] = vm.dstack.peek_raw()?;
        if <Vec<u8> as OpcodeData<bool>>::deserialize(&result)? {
            vm.dstack.push(result);
        }
        Ok(())
    }

    opcode OpDepth<0x74, 1, "OP_DEPTH">(self, vm) push_number(vm.dstack.len() as i64, vm)

    opcode OpDrop<0x75, 1, "OP_DROP">(self, vm) vm.dstack.drop_items::<1>()
    opcode OpDup<0x76, 1, "OP_DUP">(self, vm) vm.dstack.dup_items::<1>()

    opcode OpNip<0x77, 1, "OP_NIP">(self, vm) {
        let [_, top] = vm.dstack.pop_raw()?;
        vm.dstack.push(top);
        Ok(())
    }

    opcode OpOver<0x78, 1, "OP_OVER">(self, vm) vm.dstack.over_items::<1>()

    opcode OpPick<0x79, 1, "OP_PICK">(self, vm) {
        let [loc]: [i32; 1] = vm.dstack.pop_items()?;
        let index = stack_index(loc, vm.dstack.len())?;
        let item = vm.dstack[index].clone();
        vm.dstack.push(item);
        Ok(())
    }

    opcode OpRoll<0x7a, 1, "OP_ROLL">(self, vm) {
        let [loc]: [i32; 1] = vm.dstack.pop_items()?;
        let index = stack_index(loc, vm.dstack.len())?;
        let item = vm.dstack.remove(index);
        vm.dstack.push(item);
        Ok(())
    }

    opcode OpRot<0x7b, 1, "OP_ROT">(self, vm) vm.dstack.rot_items::<1>()
    opcode OpSwap<0x7c, 1, "OP_SWAP">(self, vm) vm.dstack.swap_items::<1>()

    opcode OpTuck<0x7d, 1, "OP_TUCK">(self, vm) {
        let [second, top] = vm.dstack.pop_raw()?;
        vm.dstack.extend([top.clone(), second, top]);
        Ok(())
    }

    // Splice opcodes.
    opcode OpCat<0x7e, 1, "OP_CAT">(self, vm) {
        let [a, b] = vm.dstack.pop_raw()?;
        if a.len() + b.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(TxScriptError::ElementTooBig(a.len() + b.len(), MAX_SCRIPT_ELEMENT_SIZE));
        }
        vm.dstack.push([a, b].concat());
        Ok(())
    }

    opcode OpSplit<0x7f, 1, "OP_SPLIT">(self, vm) {
        let [position]: [i64; 1] = vm.dstack.pop_items()?;
        let [mut data] = vm.dstack.pop_raw()?;
        match usize::try_from(position) {
            Ok(at) if at <= data.len() => {
                let tail = data.split_off(at);
                vm.dstack.push(data);
                vm.dstack.push(tail);
                Ok(())
            }
            _ => Err(TxScriptError::InvalidSplitRange(position, data.len())),
        }
    }

    opcode OpNum2Bin<0x80, 1, "OP_NUM2BIN">(self, vm) {
        let [size]: [i64; 1] = vm.dstack.pop_items()?;
        let [value] = vm.dstack.pop_raw()?;
        let size = match usize::try_from(size) {
            Ok(size) if size <= MAX_SCRIPT_ELEMENT_SIZE => size,
            _ => return Err(TxScriptError::NumberTooBig(format!("requested element size {size} is out of range"))),
        };
        let mut encoded = minimally_encode(value);
        if encoded.len() > size {
            return Err(TxScriptError::NumberTooBig(format!("value encoded as {encoded:x?} does not fit in {size} bytes")));
        }
        if encoded.len() < size {
            // Move the sign bit to the new last byte
            let sign = encoded.last_mut().map_or(0, |last| {
                let sign = *last & 0x80;
                *last &= 0x7f;
                sign
            });
            encoded.resize(size - 1, 0);
            encoded.push(sign);
        }
        vm.dstack.push(encoded);
        Ok(())
    }

    opcode OpBin2Num<0x81, 1, "OP_BIN2NUM">(self, vm) {
        let [value] = vm.dstack.pop_raw()?;
        let encoded = minimally_encode(value);
        if encoded.len() > MAX_SCRIPT_NUM_LEN {
            return Err(TxScriptError::NumberTooBig(format!(
                "numeric value encoded as {encoded:x?} exceeds the max allowed of {MAX_SCRIPT_NUM_LEN} bytes"
            )));
        }
        vm.dstack.push(encoded);
        Ok(())
    }

    opcode OpSize<0x82, 1, "OP_SIZE">(self, vm) {
        let size = vm.dstack.last().map(Vec::len).ok_or(TxScriptError::InvalidStackOperation(1, 0))?;
        push_number(size as i64, vm)
    }

    // Bitwise logic opcodes.
    opcode OpInvert<0x83, 1, "OP_INVERT">(self, vm) {
        let [data] = vm.dstack.pop_raw()?;
        vm.dstack.push(data.iter().map(|byte| !byte).collect());
        Ok(())
    }

    opcode OpAnd<0x84, 1, "OP_AND">(self, vm) bitwise(vm, |a, b| a & b)
    opcode OpOr<0x85, 1, "OP_OR">(self, vm) bitwise(vm, |a, b| a | b)
    opcode OpXor<0x86, 1, "OP_XOR">(self, vm) bitwise(vm, |a, b| a ^ b)

    opcode OpEqual<0x87, 1, "OP_EQUAL">(self, vm) {
        let [a, b] = vm.dstack.pop_raw()?;
        vm.dstack.push_item(a == b);
        Ok(())
    }

    opcode OpEqualVerify<0x88, 1, "OP_EQUALVERIFY">(self, vm) {
        OpEqual{data: self.data.clone()}.execute(vm)?;
        verify(vm)
    }

    opcode OpReserved1<0x89, 1, "OP_RESERVED1">(self, vm) Err(TxScriptError::OpcodeReserved(format!("{self:?}")))
    opcode OpReserved2<0x8a, 1, "OP_RESERVED2">(self, vm) Err(TxScriptError::OpcodeReserved(format!("{self:?}")))

    // Numeric related opcodes.
    opcode Op1Add<0x8b, 1, "OP_1ADD">(self, vm) {
        let [value]: [i64; 1] = vm.dstack.pop_items()?;
        vm.dstack.push_item(value + 1);
        Ok(())
    }

    opcode Op1Sub<0x8c, 1, "OP_1SUB">(self, vm) {
        let [value]: [i64; 1] = vm.dstack.pop_items()?;
        vm.dstack.push_item(value - 1);
        Ok(())
    }

    opcode Op2Mul<0x8d, 1, "OP_2MUL">(self, vm) Err(TxScriptError::OpcodeDisabled(format!("{self:?}")))
    opcode Op2Div<0x8e, 1, "OP_2DIV">(self, vm) Err(TxScriptError::OpcodeDisabled(format!("{self:?}")))

    opcode OpNegate<0x8f, 1, "OP_NEGATE">(self, vm) {
        let [value]: [i64; 1] = vm.dstack.pop_items()?;
        vm.dstack.push_item(-value);
        Ok(())
    }

    opcode OpAbs<0x90, 1, "OP_ABS">(self, vm) {
        let [m]: [i64; 1] = vm.dstack.pop_items()?;
        vm.dstack.push_item(m.abs());
        Ok(())
    }

    opcode OpNot<0x91, 1, "OP_NOT">(self, vm) {
        let [m]: [i64; 1] = vm.dstack.pop_items()?;
        vm.dstack.push_item((m == 0) as i64);
        Ok(())
    }

    opcode Op0NotEqual<0x92, 1, "OP_0NOTEQUAL">(self, vm) {
        let [m]: [i64; 1] = vm.dstack.pop_items()?;
        vm.dstack.push_item((m != 0) as i64 );
        Ok(())
    }

    opcode OpAdd<0x93, 1, "OP_ADD">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item(a+b);
        Ok(())
    }

    opcode OpSub<0x94, 1, "OP_SUB">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item(a-b);
        Ok(())
    }

    opcode OpMul<0x95, 1, "OP_MUL">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item(a*b);
        Ok(())
    }

    opcode OpDiv<0x96, 1, "OP_DIV">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        if b == 0 {
            return Err(TxScriptError::DivisionByZero);
        }
        vm.dstack.push_item(a/b);
        Ok(())
    }

    opcode OpMod<0x97, 1, "OP_MOD">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        if b == 0 {
            return Err(TxScriptError::DivisionByZero);
        }
        vm.dstack.push_item(a%b);
        Ok(())
    }

    opcode OpLShift<0x98, 1, "OP_LSHIFT">(self, vm) shift(vm, shift_left)
    opcode OpRShift<0x99, 1, "OP_RSHIFT">(self, vm) shift(vm, shift_right)

    opcode OpBoolAnd<0x9a, 1, "OP_BOOLAND">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item(((a != 0) && (b != 0)) as i64);
        Ok(())
    }

    opcode OpBoolOr<0x9b, 1, "OP_BOOLOR">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item(((a != 0) || (b != 0)) as i64);
        Ok(())
    }

    opcode OpNumEqual<0x9c, 1, "OP_NUMEQUAL">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item((a == b) as i64);
        Ok(())
    }

    opcode OpNumEqualVerify<0x9d, 1, "OP_NUMEQUALVERIFY">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        match a == b {
            true => Ok(()),
            false => Err(TxScriptError::VerifyError)
        }
    }

    opcode OpNumNotEqual<0x9e, 1, "OP_NUMNOTEQUAL">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item((a != b) as i64);
        Ok(())
    }

    opcode OpLessThan<0x9f, 1, "OP_LESSTHAN">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item((a < b) as i64);
        Ok(())
    }

    opcode OpGreaterThan<0xa0, 1, "OP_GREATERTHAN">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item((a > b) as i64);
        Ok(())
    }

    opcode OpLessThanOrEqual<0xa1, 1, "OP_LESSTHANOREQUAL">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item((a <= b) as i64);
        Ok(())
    }

    opcode OpGreaterThanOrEqual<0xa2, 1, "OP_GREATERTHANOREQUAL">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item((a >= b) as i64);
        Ok(())
    }

    opcode OpMin<0xa3, 1, "OP_MIN">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item(min(a,b));
        Ok(())
    }

    opcode OpMax<0xa4, 1, "OP_MAX">(self, vm) {
        let [a,b]: [i64; 2] = vm.dstack.pop_items()?;
        vm.dstack.push_item(max(a,b));
        Ok(())
    }

    opcode OpWithin<0xa5, 1, "OP_WITHIN">(self, vm) {
        let [x,l,u]: [i64; 3] = vm.dstack.pop_items()?;
        vm.dstack.push_item((x >= l && x < u) as i64);
        Ok(())
    }

    // Crypto opcodes.
    opcode OpRipemd160<0xa6, 1, "OP_RIPEMD160">(self, vm) hash_top(vm, |data| lockbox_hashes::ripemd160(data))
    opcode OpSha1<0xa7, 1, "OP_SHA1">(self, vm) hash_top(vm, |data| lockbox_hashes::sha1(data))
    opcode OpSha256<0xa8, 1, "OP_SHA256">(self, vm) hash_top(vm, |data| lockbox_hashes::sha256(data))
    opcode OpHash160<0xa9, 1, "OP_HASH160">(self, vm) hash_top(vm, |data| lockbox_hashes::hash160(data))
    opcode OpHash256<0xaa, 1, "OP_HASH256">(self, vm) hash_top(vm, |data| lockbox_hashes::sha256d(data))

    opcode OpCodeSeparator<0xab, 1, "OP_CODESEPARATOR">(self, vm) {
        // The step loop has already moved the program counter past this opcode
        vm.code_separator = vm.pc;
        Ok(())
    }

    opcode OpCheckSig<0xac, 1, "OP_CHECKSIG">(self, vm) {
        let [sig, key] = vm.dstack.pop_raw()?;
        let valid = vm.check_signature(&key, &sig)?;
        vm.dstack.push_item(valid);
        Ok(())
    }

    opcode OpCheckSigVerify<0xad, 1, "OP_CHECKSIGVERIFY">(self, vm) {
        OpCheckSig{data: self.data.clone()}.execute(vm)?;
        verify(vm)
    }

    opcode OpCheckMultiSig<0xae, 1, "OP_CHECKMULTISIG">(self, vm) vm.op_check_multisig()

    opcode OpCheckMultiSigVerify<0xaf, 1, "OP_CHECKMULTISIGVERIFY">(self, vm) {
        OpCheckMultiSig{data: self.data.clone()}.execute(vm)?;
        verify(vm)
    }

    // Expansion no-ops. OP_NOP2 and OP_NOP3 were OP_CHECKLOCKTIMEVERIFY and OP_CHECKSEQUENCEVERIFY.
    opcode OpNop1<0xb0, 1, "OP_NOP1">(self, vm) Ok(())
    opcode OpNop2<0xb1, 1, "OP_NOP2">(self, vm) Ok(())
    opcode OpNop3<0xb2, 1, "OP_NOP3">(self, vm) Ok(())
    opcode OpNop4<0xb3, 1, "OP_NOP4">(self, vm) Ok(())
    opcode OpNop5<0xb4, 1, "OP_NOP5">(self, vm) Ok(())
    opcode OpNop6<0xb5, 1, "OP_NOP6">(self, vm) Ok(())
    opcode OpNop7<0xb6, 1, "OP_NOP7">(self, vm) Ok(())
    opcode OpNop8<0xb7, 1, "OP_NOP8">(self, vm) Ok(())
    opcode OpNop9<0xb8, 1, "OP_NOP9">(self, vm) Ok(())
    opcode OpNop10<0xb9, 1, "OP_NOP10">(self, vm) Ok(())

    // Undefined opcodes.
    opcode OpUnknown186<0xba, 1, "OP_UNKNOWN186">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown187<0xbb, 1, "OP_UNKNOWN187">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown188<0xbc, 1, "OP_UNKNOWN188">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown189<0xbd, 1, "OP_UNKNOWN189">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown190<0xbe, 1, "OP_UNKNOWN190">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown191<0xbf, 1, "OP_UNKNOWN191">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown192<0xc0, 1, "OP_UNKNOWN192">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown193<0xc1, 1, "OP_UNKNOWN193">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown194<0xc2, 1, "OP_UNKNOWN194">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown195<0xc3, 1, "OP_UNKNOWN195">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown196<0xc4, 1, "OP_UNKNOWN196">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown197<0xc5, 1, "OP_UNKNOWN197">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown198<0xc6, 1, "OP_UNKNOWN198">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown199<0xc7, 1, "OP_UNKNOWN199">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown200<0xc8, 1, "OP_UNKNOWN200">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown201<0xc9, 1, "OP_UNKNOWN201">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown202<0xca, 1, "OP_UNKNOWN202">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown203<0xcb, 1, "OP_UNKNOWN203">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown204<0xcc, 1, "OP_UNKNOWN204">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown205<0xcd, 1, "OP_UNKNOWN205">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown206<0xce, 1, "OP_UNKNOWN206">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown207<0xcf, 1, "OP_UNKNOWN207">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown208<0xd0, 1, "OP_UNKNOWN208">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown209<0xd1, 1, "OP_UNKNOWN209">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown210<0xd2, 1, "OP_UNKNOWN210">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown211<0xd3, 1, "OP_UNKNOWN211">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown212<0xd4, 1, "OP_UNKNOWN212">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown213<0xd5, 1, "OP_UNKNOWN213">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown214<0xd6, 1, "OP_UNKNOWN214">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown215<0xd7, 1, "OP_UNKNOWN215">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown216<0xd8, 1, "OP_UNKNOWN216">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown217<0xd9, 1, "OP_UNKNOWN217">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown218<0xda, 1, "OP_UNKNOWN218">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown219<0xdb, 1, "OP_UNKNOWN219">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown220<0xdc, 1, "OP_UNKNOWN220">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown221<0xdd, 1, "OP_UNKNOWN221">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown222<0xde, 1, "OP_UNKNOWN222">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown223<0xdf, 1, "OP_UNKNOWN223">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown224<0xe0, 1, "OP_UNKNOWN224">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown225<0xe1, 1, "OP_UNKNOWN225">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown226<0xe2, 1, "OP_UNKNOWN226">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown227<0xe3, 1, "OP_UNKNOWN227">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown228<0xe4, 1, "OP_UNKNOWN228">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown229<0xe5, 1, "OP_UNKNOWN229">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown230<0xe6, 1, "OP_UNKNOWN230">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown231<0xe7, 1, "OP_UNKNOWN231">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown232<0xe8, 1, "OP_UNKNOWN232">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown233<0xe9, 1, "OP_UNKNOWN233">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown234<0xea, 1, "OP_UNKNOWN234">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown235<0xeb, 1, "OP_UNKNOWN235">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown236<0xec, 1, "OP_UNKNOWN236">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown237<0xed, 1, "OP_UNKNOWN237">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown238<0xee, 1, "OP_UNKNOWN238">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown239<0xef, 1, "OP_UNKNOWN239">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown240<0xf0, 1, "OP_UNKNOWN240">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown241<0xf1, 1, "OP_UNKNOWN241">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown242<0xf2, 1, "OP_UNKNOWN242">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown243<0xf3, 1, "OP_UNKNOWN243">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown244<0xf4, 1, "OP_UNKNOWN244">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown245<0xf5, 1, "OP_UNKNOWN245">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown246<0xf6, 1, "OP_UNKNOWN246">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown247<0xf7, 1, "OP_UNKNOWN247">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown248<0xf8, 1, "OP_UNKNOWN248">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown249<0xf9, 1, "OP_UNKNOWN249">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))

    opcode OpSmallInteger<0xfa, 1, "OP_SMALLINTEGER">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpPubKeys<0xfb, 1, "OP_PUBKEYS">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpUnknown252<0xfc, 1, "OP_UNKNOWN252">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpPubKeyHash<0xfd, 1, "OP_PUBKEYHASH">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpPubKey<0xfe, 1, "OP_PUBKEY">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
    opcode OpInvalidOpCode<0xff, 1, "OP_INVALIDOPCODE">(self, vm) Err(TxScriptError::InvalidOpcode(format!("{self:?}")))
}

/// Display name of an opcode.
pub fn opcode_name(value: u8) -> &'static str {
    OPCODE_TABLE.get(value as usize).map_or("OP_INVALIDOPCODE", |(_, name)| name)
}

// converts an opcode from the list of Op0 to Op16 to its associated value
pub fn to_small_int<T: VerifiableTransaction>(opcode: &dyn OpCodeImplementation<T>) -> Option<u8> {
    match opcode.value() {
        codes::OpFalse => Some(0),
        value @ codes::OpTrue..=codes::Op16 => Some(value - (codes::OpTrue - 1)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use crate::data_stack::Stack;
    use crate::opcodes::{self, OPCODE_TABLE, OpCodeExecution, OpCodeImplementation, codes, opcode_name};
    use crate::{TxScriptEngine, TxScriptError};
    use lockbox_consensus_core::hashing::sighash::SigHashReusedValues;
    use lockbox_consensus_core::tx::PopulatedTransaction;

    struct TestCase<'a> {
        init: Stack,
        code: Box<dyn OpCodeImplementation<PopulatedTransaction<'a>>>,
        dstack: Stack,
    }

    struct ErrorTestCase<'a> {
        init: Stack,
        code: Box<dyn OpCodeImplementation<PopulatedTransaction<'a>>>,
        error: TxScriptError,
    }

    fn run_success_test_cases(tests: Vec<TestCase>) {
        let reused_values = SigHashReusedValues::new();
        for TestCase { init, code, dstack } in tests {
            let mut vm = TxScriptEngine::new(&reused_values);
            vm.dstack = init;
            code.execute(&mut vm).unwrap_or_else(|_| panic!("Opcode {} should not fail", code.value()));
            assert_eq!(*vm.dstack, dstack, "OpCode {} Pushed wrong value", code.value());
        }
    }

    fn run_error_test_cases(tests: Vec<ErrorTestCase>) {
        let reused_values = SigHashReusedValues::new();
        for ErrorTestCase { init, code, error } in tests {
            let mut vm = TxScriptEngine::new(&reused_values);
            vm.dstack = init.clone();
            assert_eq!(code.execute(&mut vm), Err(error), "Opcode {} returned an unexpected result on {:?}", code.value(), init);
        }
    }

    #[test]
    fn test_opcode_table() {
        assert_eq!(OPCODE_TABLE.len(), 256);
        for (i, (value, _)) in OPCODE_TABLE.iter().enumerate() {
            assert_eq!(*value as usize, i);
        }
        assert_eq!(opcode_name(codes::OpFalse), "OP_0");
        assert_eq!(opcode_name(codes::OpCheckSig), "OP_CHECKSIG");
        assert_eq!(opcode_name(codes::OpNop2), "OP_NOP2");
        assert_eq!(opcode_name(codes::OpSplit), "OP_SPLIT");
    }

    #[test]
    fn test_opcode_disabled() {
        let tests: Vec<Box<dyn OpCodeImplementation<PopulatedTransaction>>> =
            vec![opcodes::Op2Mul::empty().expect("Should accept empty"), opcodes::Op2Div::empty().expect("Should accept empty")];

        let reused_values = SigHashReusedValues::new();
        let mut vm = TxScriptEngine::new(&reused_values);

        for pop in tests {
            assert!(pop.is_disabled());
            match pop.execute(&mut vm) {
                Err(TxScriptError::OpcodeDisabled(_)) => {}
                _ => panic!("Opcode {pop:?} should be disabled"),
            }
        }
    }

    #[test]
    fn test_opcode_reserved() {
        let tests: Vec<Box<dyn OpCodeImplementation<PopulatedTransaction>>> = vec![
            opcodes::OpReserved::empty().expect("Should accept empty"),
            opcodes::OpVer::empty().expect("Should accept empty"),
            opcodes::OpVerIf::empty().expect("Should accept empty"),
            opcodes::OpVerNotIf::empty().expect("Should accept empty"),
            opcodes::OpReserved1::empty().expect("Should accept empty"),
            opcodes::OpReserved2::empty().expect("Should accept empty"),
        ];

        let reused_values = SigHashReusedValues::new();
        let mut vm = TxScriptEngine::new(&reused_values);

        for pop in tests {
            match pop.execute(&mut vm) {
                Err(TxScriptError::OpcodeReserved(_)) => {}
                _ => panic!("Opcode {pop:?} should be reserved"),
            }
        }
    }

    #[test]
    fn test_opcode_invalid() {
        let tests: Vec<Box<dyn OpCodeImplementation<PopulatedTransaction>>> = vec![
            opcodes::OpUnknown186::empty().expect("Should accept empty"),
            opcodes::OpUnknown200::empty().expect("Should accept empty"),
            opcodes::OpUnknown249::empty().expect("Should accept empty"),
            opcodes::OpSmallInteger::empty().expect("Should accept empty"),
            opcodes::OpPubKeys::empty().expect("Should accept empty"),
            opcodes::OpUnknown252::empty().expect("Should accept empty"),
            opcodes::OpPubKeyHash::empty().expect("Should accept empty"),
            opcodes::OpPubKey::empty().expect("Should accept empty"),
            opcodes::OpInvalidOpCode::empty().expect("Should accept empty"),
        ];

        let reused_values = SigHashReusedValues::new();
        let mut vm = TxScriptEngine::new(&reused_values);

        for pop in tests {
            match pop.execute(&mut vm) {
                Err(TxScriptError::InvalidOpcode(_)) => {}
                _ => panic!("Opcode {pop:?} should be invalid"),
            }
        }
    }

    #[test]
    fn test_opcode_lengths() {
        type Tx<'a> = PopulatedTransaction<'a>;
        assert!(matches!(<opcodes::OpData2 as OpCodeExecution<Tx>>::new(vec![1]), Err(TxScriptError::MalformedPush(2, 1))));
        assert!(<opcodes::OpPushData1 as OpCodeExecution<Tx>>::new(vec![0; 255]).is_ok());
        assert!(matches!(
            <opcodes::OpPushData1 as OpCodeExecution<Tx>>::new(vec![0; 256]),
            Err(TxScriptError::MalformedPush(255, 256))
        ));
    }

    #[test]
    fn test_push_data() {
        run_success_test_cases(vec![
            TestCase { code: opcodes::OpFalse::empty().expect("Should accept empty"), dstack: vec![vec![]], init: Default::default() },
            TestCase {
                code: opcodes::OpData1::new([1u8; 1].to_vec()).expect("Valid opcode"),
                dstack: vec![[1u8; 1].to_vec()],
                init: Default::default(),
            },
            TestCase {
                code: opcodes::OpData20::new([1u8; 20].to_vec()).expect("Valid opcode"),
                dstack: vec![[1u8; 20].to_vec()],
                init: Default::default(),
            },
            TestCase {
                code: opcodes::OpPushData2::new([1u8; 300].to_vec()).expect("Valid opcode"),
                dstack: vec![[1u8; 300].to_vec()],
                init: Default::default(),
            },
            TestCase { code: opcodes::Op1Negate::empty().expect("Should accept empty"), dstack: vec![vec![0x81]], init: Default::default() },
            TestCase { code: opcodes::Op16::empty().expect("Should accept empty"), dstack: vec![vec![16]], init: Default::default() },
        ]);
    }

    #[test]
    fn test_stack_opcodes() {
        run_success_test_cases(vec![
            TestCase {
                code: opcodes::OpPick::empty().expect("Should accept empty"),
                init: vec![vec![1], vec![2], vec![3], vec![1]],
                dstack: vec![vec![1], vec![2], vec![3], vec![2]],
            },
            TestCase {
                code: opcodes::OpRoll::empty().expect("Should accept empty"),
                init: vec![vec![1], vec![2], vec![3], vec![2]],
                dstack: vec![vec![2], vec![3], vec![1]],
            },
            TestCase {
                code: opcodes::OpTuck::empty().expect("Should accept empty"),
                init: vec![vec![1], vec![2]],
                dstack: vec![vec![2], vec![1], vec![2]],
            },
            TestCase { code: opcodes::OpNip::empty().expect("Should accept empty"), init: vec![vec![1], vec![2]], dstack: vec![vec![2]] },
            TestCase {
                code: opcodes::OpIfDup::empty().expect("Should accept empty"),
                init: vec![vec![0x80]],
                dstack: vec![vec![0x80]],
            },
            TestCase {
                code: opcodes::OpSize::empty().expect("Should accept empty"),
                init: vec![vec![7; 3]],
                dstack: vec![vec![7; 3], vec![3]],
            },
        ]);

        run_error_test_cases(vec![
            ErrorTestCase {
                code: opcodes::OpPick::empty().expect("Should accept empty"),
                init: vec![vec![1], vec![5]],
                error: TxScriptError::InvalidStackOperation(6, 1),
            },
            ErrorTestCase {
                code: opcodes::OpRoll::empty().expect("Should accept empty"),
                init: vec![vec![1], vec![0x81]],
                error: TxScriptError::InvalidState("pick at a negative value".to_string()),
            },
            ErrorTestCase {
                code: opcodes::OpNip::empty().expect("Should accept empty"),
                init: vec![vec![1]],
                error: TxScriptError::InvalidStackOperation(2, 1),
            },
        ]);
    }

    #[test]
    fn test_arithmetic() {
        run_success_test_cases(vec![
            TestCase { code: opcodes::OpAdd::empty().expect("Should accept empty"), init: vec![vec![2], vec![3]], dstack: vec![vec![5]] },
            TestCase { code: opcodes::OpSub::empty().expect("Should accept empty"), init: vec![vec![2], vec![3]], dstack: vec![vec![0x81]] },
            TestCase { code: opcodes::OpMul::empty().expect("Should accept empty"), init: vec![vec![6], vec![7]], dstack: vec![vec![42]] },
            TestCase {
                code: opcodes::OpDiv::empty().expect("Should accept empty"),
                init: vec![vec![0x87], vec![2]],
                dstack: vec![vec![0x83]],
            },
            TestCase {
                code: opcodes::OpMod::empty().expect("Should accept empty"),
                init: vec![vec![0x87], vec![2]],
                dstack: vec![vec![0x81]],
            },
            TestCase {
                code: opcodes::OpWithin::empty().expect("Should accept empty"),
                init: vec![vec![3], vec![3], vec![4]],
                dstack: vec![vec![1]],
            },
            TestCase { code: opcodes::Op1Add::empty().expect("Should accept empty"), init: vec![vec![0x7f]], dstack: vec![vec![0x80, 0x00]] },
        ]);

        run_error_test_cases(vec![
            ErrorTestCase {
                code: opcodes::OpDiv::empty().expect("Should accept empty"),
                init: vec![vec![1], vec![]],
                error: TxScriptError::DivisionByZero,
            },
            ErrorTestCase {
                code: opcodes::OpMod::empty().expect("Should accept empty"),
                init: vec![vec![1], vec![]],
                error: TxScriptError::DivisionByZero,
            },
            ErrorTestCase {
                code: opcodes::OpAdd::empty().expect("Should accept empty"),
                init: vec![vec![1]],
                error: TxScriptError::InvalidStackOperation(2, 1),
            },
        ]);
    }

    #[test]
    fn test_splice() {
        run_success_test_cases(vec![
            TestCase {
                code: opcodes::OpCat::empty().expect("Should accept empty"),
                init: vec![vec![1, 2], vec![3]],
                dstack: vec![vec![1, 2, 3]],
            },
            TestCase {
                code: opcodes::OpSplit::empty().expect("Should accept empty"),
                init: vec![vec![1, 2, 3], vec![1]],
                dstack: vec![vec![1], vec![2, 3]],
            },
            TestCase {
                code: opcodes::OpSplit::empty().expect("Should accept empty"),
                init: vec![vec![1, 2, 3], vec![3]],
                dstack: vec![vec![1, 2, 3], vec![]],
            },
            TestCase {
                code: opcodes::OpNum2Bin::empty().expect("Should accept empty"),
                init: vec![vec![2], vec![4]],
                dstack: vec![vec![2, 0, 0, 0]],
            },
            TestCase {
                code: opcodes::OpNum2Bin::empty().expect("Should accept empty"),
                init: vec![vec![0x85], vec![2]],
                dstack: vec![vec![0x05, 0x80]],
            },
            TestCase {
                code: opcodes::OpBin2Num::empty().expect("Should accept empty"),
                init: vec![vec![2, 0, 0, 0]],
                dstack: vec![vec![2]],
            },
            TestCase {
                code: opcodes::OpBin2Num::empty().expect("Should accept empty"),
                init: vec![vec![0x05, 0x00, 0x80]],
                dstack: vec![vec![0x85]],
            },
        ]);

        run_error_test_cases(vec![
            ErrorTestCase {
                code: opcodes::OpSplit::empty().expect("Should accept empty"),
                init: vec![vec![1, 2, 3], vec![4]],
                error: TxScriptError::InvalidSplitRange(4, 3),
            },
            ErrorTestCase {
                code: opcodes::OpCat::empty().expect("Should accept empty"),
                init: vec![vec![0; 500], vec![0; 21]],
                error: TxScriptError::ElementTooBig(521, 520),
            },
        ]);
    }

    #[test]
    fn test_bitwise() {
        run_success_test_cases(vec![
            TestCase { code: opcodes::OpInvert::empty().expect("Should accept empty"), init: vec![vec![0x0f]], dstack: vec![vec![0xf0]] },
            TestCase {
                code: opcodes::OpAnd::empty().expect("Should accept empty"),
                init: vec![vec![0x0f, 0xff], vec![0xff, 0x0f]],
                dstack: vec![vec![0x0f, 0x0f]],
            },
            TestCase {
                code: opcodes::OpXor::empty().expect("Should accept empty"),
                init: vec![vec![0x0f, 0xff], vec![0xff, 0x0f]],
                dstack: vec![vec![0xf0, 0xf0]],
            },
            TestCase {
                code: opcodes::OpLShift::empty().expect("Should accept empty"),
                init: vec![vec![0x12, 0x34], vec![4]],
                dstack: vec![vec![0x23, 0x40]],
            },
            TestCase {
                code: opcodes::OpLShift::empty().expect("Should accept empty"),
                init: vec![vec![0x01, 0x80], vec![9]],
                dstack: vec![vec![0x00, 0x00]],
            },
            TestCase {
                code: opcodes::OpRShift::empty().expect("Should accept empty"),
                init: vec![vec![0x01, 0x80], vec![1]],
                dstack: vec![vec![0x00, 0xc0]],
            },
        ]);

        run_error_test_cases(vec![ErrorTestCase {
            code: opcodes::OpOr::empty().expect("Should accept empty"),
            init: vec![vec![1], vec![1, 2]],
            error: TxScriptError::OperandSizeMismatch(1, 2),
        }]);
    }

    #[test]
    fn test_hashes() {
        run_success_test_cases(vec![
            TestCase {
                code: opcodes::OpSha256::empty().expect("Should accept empty"),
                init: vec![b"hello".to_vec()],
                dstack: vec![hex::decode("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824").unwrap()],
            },
            TestCase {
                code: opcodes::OpHash160::empty().expect("Should accept empty"),
                init: vec![vec![]],
                dstack: vec![hex::decode("b472a266d0bd89c13706a4132ccfb16f7c3b9fcb").unwrap()],
            },
        ]);
    }

    #[test]
    fn test_conditionals() {
        type Op<'a> = Box<dyn OpCodeImplementation<PopulatedTransaction<'a>>>;
        let reused_values = SigHashReusedValues::new();
        let mut vm = TxScriptEngine::<PopulatedTransaction>::new(&reused_values);
        let (op_if, op_else, op_endif): (Op, Op, Op) =
            (opcodes::OpIf::empty().unwrap(), opcodes::OpElse::empty().unwrap(), opcodes::OpEndIf::empty().unwrap());

        vm.dstack = vec![vec![0x00, 0x80]];
        op_if.execute(&mut vm).unwrap();
        assert!(!vm.is_executing());
        op_else.execute(&mut vm).unwrap();
        assert!(vm.is_executing());
        op_endif.execute(&mut vm).unwrap();
        assert_eq!(op_endif.execute(&mut vm), Err(TxScriptError::InvalidState("condition stack empty".to_string())));
    }
}
