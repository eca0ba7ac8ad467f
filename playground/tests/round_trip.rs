//! Funds a custom lock from a pay-to-pubkey-hash output, spends it, and checks the
//! spend against the funding transaction.

use lockbox_addresses::Prefix;
use lockbox_consensus_core::{
    constants::{LOCK_TIME_ENABLED_SEQUENCE, TX_VERSION},
    keys::PrivateKey,
    tx::{Transaction, TransactionId, TransactionInput, TransactionOutpoint, TransactionOutput},
};
use lockbox_playground::{
    BuildResult, RPuzzle, Settings, TransactionBuilder, build_hash_puzzle, generate_r_puzzle, run_trace_with_real_context,
};
use lockbox_txscript::{PuzzleHash, pay_to_pubkey_hash};

fn key(byte: u8) -> PrivateKey {
    PrivateKey::from_slice(&[byte; 32], Prefix::Testnet).unwrap()
}

fn funding(owner: &PrivateKey, value: u64) -> Vec<u8> {
    let input = TransactionInput::unsigned(TransactionOutpoint::new(TransactionId::from_bytes([0x42; 32]), 3));
    Transaction::new(TX_VERSION, vec![input], vec![TransactionOutput::new(value, pay_to_pubkey_hash(&owner.pubkey_hash()))], 0)
        .serialize()
}

fn builder() -> TransactionBuilder {
    TransactionBuilder::new(Settings::default().with_fee_rate(1.0).unwrap())
}

fn lock(owner: &PrivateKey, locking_asm: &str, amount: u64) -> BuildResult {
    let lock = builder().build_lock_transaction(owner, &funding(owner, 100_000), 0, locking_asm, amount, None).unwrap();
    let tx = Transaction::deserialize(&lock.bytes).unwrap();
    assert_eq!(tx.outputs.iter().map(|output| output.value).sum::<u64>() + lock.fee, 100_000);
    lock
}

fn assert_spends(lock: &BuildResult, unlock: &BuildResult) {
    let trace = run_trace_with_real_context(&lock.bytes, &unlock.bytes, 0, 0).unwrap();
    assert!(trace.valid, "{:?}", trace.rejection);
    assert!(trace.steps.iter().all(|step| step.error.is_none()));
}

#[test]
fn hash_puzzle_round_trip() {
    let owner = key(1);
    let puzzle = build_hash_puzzle("open sesame", false, PuzzleHash::Hash160).unwrap();
    let lock = lock(&owner, &puzzle.locking_asm, 20_000);

    let unlock = builder().build_unlock_transaction(&lock.bytes, 0, &puzzle.preimage_hex, &owner.address(), None).unwrap();
    let tx = Transaction::deserialize(&unlock.bytes).unwrap();
    assert_eq!(tx.outputs[0].value + unlock.fee, 20_000);
    assert_spends(&lock, &unlock);
}

#[test]
fn signature_round_trip() {
    let owner = key(1);
    let spender = key(2);
    let locking = format!("OP_DUP OP_HASH160 {} OP_EQUALVERIFY OP_CHECKSIG", hex::encode(spender.pubkey_hash()));
    let lock = lock(&owner, &locking, 15_000);

    let unlock = builder().build_unlock_transaction(&lock.bytes, 0, "<sig> <pubkey>", &owner.address(), Some(&spender)).unwrap();
    assert_spends(&lock, &unlock);

    // The signature commits to this exact spend
    let wrong_output = builder().build_unlock_transaction(&lock.bytes, 0, "<sig> <pubkey>", &spender.address(), Some(&spender)).unwrap();
    let mut tampered = Transaction::deserialize(&wrong_output.bytes).unwrap();
    tampered.outputs[0].value -= 1;
    let trace = run_trace_with_real_context(&lock.bytes, &tampered.serialize(), 0, 0).unwrap();
    assert!(!trace.valid);
}

#[test]
fn r_puzzle_round_trip() {
    let owner = key(1);
    let puzzle = generate_r_puzzle(Some(PuzzleHash::Hash160)).unwrap();
    let lock = lock(&owner, &puzzle.locking_asm, 12_000);

    let nonce = lockbox_playground::puzzle::parse_nonce(&puzzle.nonce_hex).unwrap();
    let anyone = key(9);
    let unlock = builder().build_r_puzzle_unlock_transaction(&lock.bytes, 0, &nonce, &anyone, &anyone.address()).unwrap();
    assert_spends(&lock, &unlock);

    let other = RPuzzle::from_nonce(&lockbox_playground::puzzle::parse_nonce(&"11".repeat(32)).unwrap(), None).unwrap();
    assert_ne!(other.r_hex, puzzle.r_hex);
}

#[test]
fn lock_time_round_trip() {
    let owner = key(1);
    let lock = lock(&owner, "0065cd1d OP_CHECKLOCKTIMEVERIFY OP_DROP OP_1", 9_000);

    let unlock =
        builder().build_unlock_transaction_with_lock_time(&lock.bytes, 0, "", &owner.address(), None, 500_000_000).unwrap();
    let tx = Transaction::deserialize(&unlock.bytes).unwrap();
    assert_eq!(tx.lock_time, 500_000_000);
    assert!(tx.inputs.iter().all(|input| input.sequence == LOCK_TIME_ENABLED_SEQUENCE));
    assert_spends(&lock, &unlock);
}
