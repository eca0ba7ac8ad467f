use lockbox_addresses::Prefix;
use lockbox_consensus_core::{
    constants::TX_VERSION,
    keys::PrivateKey,
    tx::{Transaction, TransactionId, TransactionInput, TransactionOutpoint, TransactionOutput},
};
use lockbox_playground::{
    Error, ErrorKind, Rejection, Settings, SpendContext, TransactionBuilder, build_hash_puzzle, parse_asm, run_trace, to_asm,
};
use lockbox_txscript::{PuzzleHash, pay_to_pubkey_hash};

fn trace_asm(locking: &str, unlocking: &str) -> lockbox_playground::TraceResult {
    run_trace(&parse_asm(locking).unwrap(), &parse_asm(unlocking).unwrap(), &SpendContext::synthetic()).unwrap()
}

#[test]
fn addition_puzzle() {
    let result = trace_asm("OP_ADD OP_5 OP_EQUAL", "OP_2 OP_3");
    assert!(result.valid);
    assert_eq!(result.final_stack, vec![vec![1u8]]);
    assert_eq!(result.steps.len(), 5);
    assert_eq!(result.steps.iter().map(|step| step.opcode.as_deref().unwrap()).collect::<Vec<_>>(), [
        "OP_2", "OP_3", "OP_ADD", "OP_5", "OP_EQUAL"
    ]);
}

#[test]
fn hash_puzzle() {
    let puzzle = build_hash_puzzle("hello", false, PuzzleHash::Sha256).unwrap();
    assert_eq!(puzzle.digest_hex, "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
    assert_eq!(puzzle.locking_asm, format!("OP_SHA256 {} OP_EQUAL", puzzle.digest_hex));

    let result = trace_asm(&puzzle.locking_asm, "68656c6c6f");
    assert!(result.valid, "{:?}", result.rejection);

    let result = trace_asm(&puzzle.locking_asm, "68656c6c6e");
    assert_eq!(result.rejection, Some(Rejection::NotTruthy));
}

#[test]
fn clean_stack_violation() {
    let result = trace_asm("OP_1", "OP_1");
    assert!(!result.valid);
    assert_eq!(result.rejection, Some(Rejection::CleanStack { remaining: 2 }));
    assert_eq!(result.error().as_deref(), Some("clean stack rule violated: 2 items remain"));
    assert_eq!(result.rejection.unwrap().kind(), ErrorKind::Acceptance);
}

#[test]
fn mid_trace_fault() {
    let result = trace_asm("OP_ADD", "OP_1");
    assert!(!result.valid);
    assert_eq!(result.steps.len(), 2);
    let last = result.steps.last().unwrap();
    assert_eq!(last.opcode.as_deref(), Some("OP_ADD"));
    assert!(last.error.is_some());
    let rejection = result.rejection.unwrap();
    assert!(matches!(rejection, Rejection::Execution { step: 1, .. }));
    assert_eq!(rejection.kind(), ErrorKind::Execution);
}

#[test]
fn ownership_mismatch() {
    let owner = PrivateKey::from_slice(&[1; 32], Prefix::Testnet).unwrap();
    let stranger = PrivateKey::from_slice(&[2; 32], Prefix::Testnet).unwrap();
    let funding = TransactionInput::unsigned(TransactionOutpoint::new(TransactionId::from_bytes([8; 32]), 0));
    let source =
        Transaction::new(TX_VERSION, vec![funding], vec![TransactionOutput::new(100_000, pay_to_pubkey_hash(&owner.pubkey_hash()))], 0);

    let err = TransactionBuilder::new(Settings::default())
        .build_lock_transaction(&stranger, &source.serialize(), 0, "OP_ADD OP_5 OP_EQUAL", 10_000, None)
        .unwrap_err();
    assert!(matches!(err, Error::KeyMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Ownership);
}

#[test]
fn asm_round_trip() {
    for asm in [
        "OP_ADD OP_5 OP_EQUAL",
        "OP_IF OP_2 OP_ELSE OP_3 OP_ENDIF",
        "0 OP_1NEGATE 68656c6c6f OP_CAT",
        "OP_CHECKLOCKTIMEVERIFY OP_DROP",
    ] {
        let script = parse_asm(asm).unwrap();
        assert_eq!(parse_asm(&to_asm(&script).unwrap()).unwrap(), script, "{asm}");
    }
    assert_eq!(to_asm(&parse_asm("OP_CHECKLOCKTIMEVERIFY OP_CHECKSEQUENCEVERIFY").unwrap()).unwrap(), "OP_NOP2 OP_NOP3");
}

#[test]
fn empty_scripts() {
    let result = trace_asm("", "");
    assert!(result.steps.is_empty());
    assert_eq!(result.rejection, Some(Rejection::EmptyStack));
}
