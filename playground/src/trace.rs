//! Step by step execution of an unlocking script followed by a locking script.

use crate::{
    codec,
    context::SpendContext,
    error::{Error, Rejection, Result},
};
use lockbox_consensus_core::{
    hashing::sighash::SigHashReusedValues,
    tx::{SignableTransaction, VerifiableTransaction},
};
use lockbox_txscript::{ExecutedOpcode, Stack, TxScriptEngine, TxScriptError, cast_to_bool};
use log::{debug, trace};
use serde::{Serialize, Serializer, ser::SerializeSeq};

/// Steps after which a run is abandoned.
pub const MAX_TRACE_STEPS: usize = 10_000;

/// A stack machine that can be driven one opcode at a time.
pub trait ScriptStepper {
    /// Executes the next opcode. Returns `Ok(false)` once every script has run.
    fn step(&mut self) -> std::result::Result<bool, TxScriptError>;
    fn stack(&self) -> &Stack;
    fn alt_stack(&self) -> &Stack;
    /// Byte offset of the next opcode in the current script.
    fn program_counter(&self) -> usize;
    fn script_index(&self) -> usize;
    /// The opcode handled by the latest `step`, if it got as far as decoding one.
    fn last_opcode(&self) -> Option<&ExecutedOpcode>;
}

impl<T: VerifiableTransaction> ScriptStepper for TxScriptEngine<'_, T> {
    fn step(&mut self) -> std::result::Result<bool, TxScriptError> {
        TxScriptEngine::step(self)
    }

    fn stack(&self) -> &Stack {
        TxScriptEngine::stack(self)
    }

    fn alt_stack(&self) -> &Stack {
        TxScriptEngine::alt_stack(self)
    }

    fn program_counter(&self) -> usize {
        TxScriptEngine::program_counter(self)
    }

    fn script_index(&self) -> usize {
        TxScriptEngine::script_index(self)
    }

    fn last_opcode(&self) -> Option<&ExecutedOpcode> {
        TxScriptEngine::last_opcode(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptSide {
    Unlocking,
    Locking,
}

impl ScriptSide {
    fn from_index(script_index: usize) -> Self {
        if script_index == 0 { ScriptSide::Unlocking } else { ScriptSide::Locking }
    }
}

fn serialize_stack<S: Serializer>(stack: &Stack, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(stack.len()))?;
    for item in stack {
        seq.serialize_element(&hex::encode(item))?;
    }
    seq.end()
}

/// Machine state right after one opcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub index: usize,
    pub side: ScriptSide,
    /// Byte offset of the opcode within its script
    pub offset: usize,
    /// The opcode as an ASM token, `None` when it could not be decoded
    pub opcode: Option<String>,
    /// False for opcodes skipped inside a branch not taken
    pub executed: bool,
    #[serde(serialize_with = "serialize_stack")]
    pub stack: Stack,
    #[serde(serialize_with = "serialize_stack")]
    pub alt_stack: Stack,
    pub error: Option<String>,
}

impl ExecutionStep {
    fn capture<S: ScriptStepper>(index: usize, stepper: &S, error: Option<&TxScriptError>) -> Self {
        let (side, offset, opcode, executed) = match stepper.last_opcode() {
            Some(op) => (ScriptSide::from_index(op.script_index), op.offset, Some(codec::opcode_token(op.value, &op.data)), op.executed),
            None => (ScriptSide::from_index(stepper.script_index()), stepper.program_counter(), None, false),
        };
        Self {
            index,
            side,
            offset,
            opcode,
            executed,
            stack: stepper.stack().clone(),
            alt_stack: stepper.alt_stack().clone(),
            error: error.map(|err| err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceResult {
    pub steps: Vec<ExecutionStep>,
    pub valid: bool,
    pub rejection: Option<Rejection>,
    #[serde(serialize_with = "serialize_stack")]
    pub final_stack: Stack,
}

impl TraceResult {
    pub fn error(&self) -> Option<String> {
        self.rejection.as_ref().map(|rejection| rejection.to_string())
    }
}

/// Outcome of a run without step snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub valid: bool,
    pub rejection: Option<Rejection>,
    pub unlocking_hex: String,
    pub locking_hex: String,
    #[serde(serialize_with = "serialize_stack")]
    pub final_stack: Stack,
}

/// The final stack rule: exactly one item left, and it is true.
pub fn check_final_stack(stack: &Stack) -> Option<Rejection> {
    match stack.last() {
        None => Some(Rejection::EmptyStack),
        Some(top) if !cast_to_bool(top) => Some(Rejection::NotTruthy),
        Some(_) if stack.len() > 1 => Some(Rejection::CleanStack { remaining: stack.len() }),
        Some(_) => None,
    }
}

fn run<S: ScriptStepper>(stepper: &mut S, mut on_step: impl FnMut(usize, &S, Option<&TxScriptError>)) -> Option<Rejection> {
    let mut steps = 0;
    loop {
        match stepper.step() {
            Ok(false) => return check_final_stack(stepper.stack()),
            Ok(true) => {
                on_step(steps, &*stepper, None);
                steps += 1;
                if steps == MAX_TRACE_STEPS {
                    // Only a machine with opcodes left is over the limit
                    return match stepper.step() {
                        Ok(false) => check_final_stack(stepper.stack()),
                        _ => Some(Rejection::SafetyLimit { limit: MAX_TRACE_STEPS }),
                    };
                }
            }
            Err(err) => {
                on_step(steps, &*stepper, Some(&err));
                return Some(Rejection::Execution { step: steps, message: err.to_string() });
            }
        }
    }
}

/// Drives `stepper` to completion, recording every step.
pub fn trace<S: ScriptStepper>(stepper: &mut S) -> TraceResult {
    let mut steps = Vec::new();
    let rejection = run(stepper, |index, stepper, error| {
        let step = ExecutionStep::capture(index, stepper, error);
        trace!("step {} {:?} {}: {:?}", step.index, step.side, step.opcode.as_deref().unwrap_or("?"), step.error);
        steps.push(step);
    });
    debug!("trace finished after {} steps: {}", steps.len(), rejection.as_ref().map_or("valid".to_string(), |r| r.to_string()));
    TraceResult { steps, valid: rejection.is_none(), rejection, final_stack: stepper.stack().clone() }
}

fn engine<'a>(
    locking: &'a [u8],
    unlocking: &'a [u8],
    context: &'a SpendContext,
    reused_values: &'a SigHashReusedValues,
) -> Result<TxScriptEngine<'a, SignableTransaction>> {
    TxScriptEngine::from_scripts(context.transaction(), context.input_index(), unlocking, locking, reused_values)
        .map_err(Error::SpendContext)
}

/// Traces `unlocking` followed by `locking`, with signature checks hashing `context`.
pub fn run_trace(locking: &[u8], unlocking: &[u8], context: &SpendContext) -> Result<TraceResult> {
    let reused_values = SigHashReusedValues::new();
    let mut engine = engine(locking, unlocking, context, &reused_values)?;
    Ok(trace(&mut engine))
}

/// Traces input `input_index` of `spending` against output `output_index` of `source`,
/// both given as serialized transactions.
pub fn run_trace_with_real_context(source: &[u8], spending: &[u8], input_index: usize, output_index: usize) -> Result<TraceResult> {
    let context = SpendContext::from_transactions(source, spending, input_index, output_index)?;
    run_trace(context.locking_script(), context.unlocking_script(), &context)
}

/// Same acceptance as [`run_trace`] without keeping per step snapshots.
pub fn validate(locking: &[u8], unlocking: &[u8], context: &SpendContext) -> Result<Verdict> {
    let reused_values = SigHashReusedValues::new();
    let mut engine = engine(locking, unlocking, context, &reused_values)?;
    let rejection = run(&mut engine, |_, _, _| {});
    debug!("validation: {}", rejection.as_ref().map_or("valid".to_string(), |r| r.to_string()));
    Ok(Verdict {
        valid: rejection.is_none(),
        rejection,
        unlocking_hex: codec::to_hex(unlocking),
        locking_hex: codec::to_hex(locking),
        final_stack: engine.stack().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::parse_asm, error::ErrorKind};
    use lockbox_txscript::opcodes::codes::{OpNop, OpTrue};

    fn trace_asm(locking: &str, unlocking: &str) -> TraceResult {
        run_trace(&parse_asm(locking).unwrap(), &parse_asm(unlocking).unwrap(), &SpendContext::synthetic()).unwrap()
    }

    /// Never finishes and never touches its stacks.
    struct Endless {
        stack: Stack,
    }

    impl ScriptStepper for Endless {
        fn step(&mut self) -> std::result::Result<bool, TxScriptError> {
            Ok(true)
        }

        fn stack(&self) -> &Stack {
            &self.stack
        }

        fn alt_stack(&self) -> &Stack {
            &self.stack
        }

        fn program_counter(&self) -> usize {
            0
        }

        fn script_index(&self) -> usize {
            1
        }

        fn last_opcode(&self) -> Option<&ExecutedOpcode> {
            None
        }
    }

    #[test]
    fn test_addition_puzzle() {
        let result = trace_asm("OP_ADD OP_5 OP_EQUAL", "OP_2 OP_3");
        assert!(result.valid, "{:?}", result.rejection);
        assert_eq!(result.final_stack, vec![vec![1]]);
        assert_eq!(result.steps.len(), 5);

        let sides: Vec<_> = result.steps.iter().map(|step| step.side).collect();
        assert_eq!(sides, [ScriptSide::Unlocking, ScriptSide::Unlocking, ScriptSide::Locking, ScriptSide::Locking, ScriptSide::Locking]);
        let opcodes: Vec<_> = result.steps.iter().map(|step| step.opcode.clone().unwrap()).collect();
        assert_eq!(opcodes, ["OP_2", "OP_3", "OP_ADD", "OP_5", "OP_EQUAL"]);
        assert_eq!(result.steps[1].stack, vec![vec![2], vec![3]]);
        assert_eq!(result.steps[2].stack, vec![vec![5]]);
        assert_eq!(result.steps[2].offset, 0);
        assert_eq!(result.steps[3].offset, 1);
    }

    #[test]
    fn test_acceptance_rule() {
        let result = trace_asm("OP_1", "OP_1");
        assert!(!result.valid);
        assert_eq!(result.rejection, Some(Rejection::CleanStack { remaining: 2 }));
        assert_eq!(result.error().unwrap(), "clean stack rule violated: 2 items remain");
        assert_eq!(result.rejection.unwrap().kind(), ErrorKind::Acceptance);

        let result = trace_asm("OP_0", "");
        assert_eq!(result.rejection, Some(Rejection::NotTruthy));

        // negative zero is false
        let result = trace_asm("80", "");
        assert_eq!(result.rejection, Some(Rejection::NotTruthy));

        // a false top is reported before the extra items
        let result = trace_asm("OP_1 OP_0", "");
        assert_eq!(result.rejection, Some(Rejection::NotTruthy));

        let result = trace_asm("OP_DROP", "OP_1");
        assert_eq!(result.rejection, Some(Rejection::EmptyStack));
    }

    #[test]
    fn test_empty_scripts() {
        let result = trace_asm("", "");
        assert!(result.steps.is_empty());
        assert_eq!(result.rejection, Some(Rejection::EmptyStack));
        assert_eq!(result.error().unwrap(), "stack empty after execution");
    }

    #[test]
    fn test_failing_step_stops_the_trace() {
        let result = trace_asm("OP_ADD OP_1", "OP_1");
        assert_eq!(result.steps.len(), 2);
        let failed = &result.steps[1];
        assert_eq!(failed.opcode.as_deref(), Some("OP_ADD"));
        assert_eq!(failed.side, ScriptSide::Locking);
        assert!(failed.error.is_some());
        assert!(result.steps[0].error.is_none());
        match result.rejection {
            Some(rejection @ Rejection::Execution { step: 1, .. }) => assert_eq!(rejection.kind(), ErrorKind::Execution),
            other => panic!("unexpected rejection {other:?}"),
        }
    }

    #[test]
    fn test_skipped_branch_and_alt_stack() {
        let result = trace_asm("OP_IF OP_RETURN OP_ELSE OP_FROMALTSTACK OP_ENDIF", "OP_1 OP_TOALTSTACK OP_0");
        // the alt stack is cleared between the two scripts
        assert_eq!(result.steps[1].alt_stack, vec![vec![1]]);
        assert!(result.steps[3].alt_stack.is_empty());
        let skipped = &result.steps[4];
        assert_eq!(skipped.opcode.as_deref(), Some("OP_RETURN"));
        assert!(!skipped.executed);
        assert!(result.steps.last().unwrap().error.is_some());
        assert_eq!(result.rejection.unwrap().kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_unbalanced_conditional() {
        let result = trace_asm("OP_1", "OP_1 OP_IF");
        let last = result.steps.last().unwrap();
        assert!(last.opcode.is_none());
        assert_eq!(last.error.as_deref(), Some(TxScriptError::ErrUnbalancedConditional.to_string().as_str()));
        assert!(!result.valid);
    }

    #[test]
    fn test_safety_limit() {
        let mut stepper = Endless { stack: vec![vec![1]] };
        let result = trace(&mut stepper);
        assert_eq!(result.steps.len(), MAX_TRACE_STEPS);
        assert_eq!(result.rejection, Some(Rejection::SafetyLimit { limit: MAX_TRACE_STEPS }));
        assert_eq!(result.rejection.unwrap().kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_finishing_at_the_limit() {
        let context = SpendContext::synthetic();
        let locking = vec![OpNop; MAX_TRACE_STEPS - 1];
        let result = run_trace(&locking, &[OpTrue], &context).unwrap();
        assert!(result.valid, "{:?}", result.rejection);
        assert_eq!(result.steps.len(), MAX_TRACE_STEPS);
        assert_eq!(result.final_stack, vec![vec![1]]);
        assert!(validate(&locking, &[OpTrue], &context).unwrap().valid);

        let locking = vec![OpNop; MAX_TRACE_STEPS];
        let result = run_trace(&locking, &[OpTrue], &context).unwrap();
        assert_eq!(result.steps.len(), MAX_TRACE_STEPS);
        assert_eq!(result.rejection, Some(Rejection::SafetyLimit { limit: MAX_TRACE_STEPS }));
    }

    #[test]
    fn test_validate() {
        let locking = parse_asm("OP_SHA256 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 OP_EQUAL").unwrap();
        let verdict = validate(&locking, &parse_asm("68656c6c6f").unwrap(), &SpendContext::synthetic()).unwrap();
        assert!(verdict.valid);
        assert_eq!(verdict.unlocking_hex, "0568656c6c6f");
        assert_eq!(verdict.final_stack, vec![vec![1]]);

        let verdict = validate(&locking, &parse_asm("68656c6c").unwrap(), &SpendContext::synthetic()).unwrap();
        assert_eq!(verdict.rejection, Some(Rejection::NotTruthy));
    }

    #[test]
    fn test_signature_fails_without_real_context() {
        let generator = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let result = trace_asm("OP_CHECKSIG", &format!("300602010102010141 {generator}"));
        assert_eq!(result.rejection, Some(Rejection::NotTruthy));
    }

    #[test]
    fn test_serialized_steps() {
        let result = trace_asm("OP_ADD OP_5 OP_EQUAL", "OP_2 OP_3");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["finalStack"][0], "01");
        assert_eq!(json["steps"][1]["stack"][1], "03");
        assert_eq!(json["steps"][0]["side"], "unlocking");
    }
}
