mod args;
mod error;

use args::{Args, Cmd, ScriptFormat, ScriptSource, parse_args};
use error::{CliError, Result};
use lockbox_addresses::{Address, Prefix};
use lockbox_consensus_core::{keys::PrivateKey, tx::PopulatedTransaction};
use lockbox_playground::{
    BuildResult, RPuzzle, SpendContext, TraceResult, TransactionBuilder, Verdict, build_hash_puzzle,
    codec::{self, detect_and_convert},
    generate_r_puzzle, glossary,
    puzzle::parse_nonce,
    run_trace, run_trace_with_real_context, templates, validate,
};
use lockbox_txscript::viewer::ScriptViewer;
use log::{debug, info};
use serde::Serialize;
use serde_json::json;

fn main() {
    let args = parse_args();
    if let Err(err) = lockbox_core::log::init_logger(args.log_dir.as_deref(), &args.log_level) {
        eprintln!("{err}");
        std::process::exit(1);
    }
    debug!("settings: {:?}", args.settings);

    if let Err(err) = run(&args) {
        eprintln!("{}: {err}", err.label());
        std::process::exit(1);
    }
}

/// Script bytes from a script argument. In ASM a hex token is a data push, never raw script.
fn script_bytes(format: ScriptFormat, text: &str) -> Result<Vec<u8>> {
    let bytes = match format {
        ScriptFormat::Asm => codec::parse_asm(text)?,
        ScriptFormat::Hex => codec::from_hex(text)?,
    };
    Ok(bytes)
}

/// ASM for the transaction builder, which resolves placeholders in ASM only.
fn script_asm(format: ScriptFormat, text: &str) -> Result<String> {
    match format {
        ScriptFormat::Asm => Ok(text.to_string()),
        ScriptFormat::Hex => Ok(codec::to_asm(&codec::from_hex(text)?)?),
    }
}

fn key(args: &Args, wif: &str) -> Result<PrivateKey> {
    let key = PrivateKey::from_wif(wif).map_err(lockbox_playground::Error::from)?;
    check_network(args, "the key", key.prefix())?;
    Ok(key)
}

fn check_network(args: &Args, what: &'static str, found: Prefix) -> Result<()> {
    if found != args.settings.network {
        return Err(CliError::Network { what, expected: args.settings.network, found });
    }
    Ok(())
}

fn check_address(args: &Args, address: &Address) -> Result<()> {
    check_network(args, "the address", address.prefix)
}

fn tx_bytes(hex_str: &str) -> Result<Vec<u8>> {
    Ok(codec::from_hex(hex_str)?)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn stack_text(stack: &[Vec<u8>]) -> String {
    let items: Vec<String> = stack.iter().map(|item| if item.is_empty() { "''".to_string() } else { hex::encode(item) }).collect();
    format!("[{}]", items.join(", "))
}

fn print_trace(result: &TraceResult) {
    for step in &result.steps {
        let opcode = step.opcode.as_deref().unwrap_or("?");
        let marker = if step.executed { ' ' } else { '-' };
        print!("{:>5} {:<9} {:04} {marker}{opcode:<24} {}", step.index, format!("{:?}", step.side).to_lowercase(), step.offset, stack_text(&step.stack));
        if !step.alt_stack.is_empty() {
            print!(" alt {}", stack_text(&step.alt_stack));
        }
        match &step.error {
            Some(error) => println!("  <- {error}"),
            None => println!(),
        }
    }
    print_outcome(result.valid, result.error(), &result.final_stack);
}

fn print_outcome(valid: bool, error: Option<String>, final_stack: &[Vec<u8>]) {
    match error {
        None if valid => println!("valid, final stack {}", stack_text(final_stack)),
        error => println!("invalid: {}, final stack {}", error.unwrap_or_default(), stack_text(final_stack)),
    }
}

fn print_build(json: bool, result: &BuildResult) -> Result<()> {
    if json {
        return print_json(result);
    }
    println!("txid: {}", result.txid);
    println!("size: {} bytes, fee: {} ({:.3} sat/byte)", result.size, result.fee, result.fee_rate);
    println!("{}", result.hex());
    Ok(())
}

fn trace_source(format: ScriptFormat, source: &ScriptSource) -> Result<TraceResult> {
    let result = match source {
        ScriptSource::Scripts { locking, unlocking } => {
            run_trace(&script_bytes(format, locking)?, &script_bytes(format, unlocking)?, &SpendContext::synthetic())?
        }
        ScriptSource::Transactions { source, spending, input_index, output_index } => {
            run_trace_with_real_context(&tx_bytes(source)?, &tx_bytes(spending)?, *input_index, *output_index)?
        }
    };
    Ok(result)
}

fn validate_source(format: ScriptFormat, source: &ScriptSource) -> Result<Verdict> {
    let verdict = match source {
        ScriptSource::Scripts { locking, unlocking } => {
            validate(&script_bytes(format, locking)?, &script_bytes(format, unlocking)?, &SpendContext::synthetic())?
        }
        ScriptSource::Transactions { source, spending, input_index, output_index } => {
            let context = SpendContext::from_transactions(&tx_bytes(source)?, &tx_bytes(spending)?, *input_index, *output_index)?;
            validate(context.locking_script(), context.unlocking_script(), &context)?
        }
    };
    Ok(verdict)
}

fn print_template(template: &templates::Template) {
    let mut flags = vec![];
    if template.needs_real_context {
        flags.push("needs a real spend");
    }
    if template.illustrative {
        flags.push("illustrative");
    }
    let flags = if flags.is_empty() { String::new() } else { format!(" ({})", flags.join(", ")) };
    println!("[{}] {}{flags}", template.category, template.name);
    println!("  locking:   {}", template.locking_asm);
    println!("  unlocking: {}", template.unlocking_asm);
    println!("  {}", template.notes);
}

fn run(args: &Args) -> Result<()> {
    let (json, format) = (args.json, args.script_format);
    match &args.command {
        Cmd::Convert { input } => {
            let converted = detect_and_convert(input);
            let (asm, hex) = if converted.was_hex {
                (converted.asm, input.trim().to_lowercase())
            } else {
                let hex = codec::to_hex(&codec::parse_asm(&converted.asm)?);
                (converted.asm, hex)
            };
            if json {
                return print_json(&json!({ "asm": asm, "hex": hex, "wasHex": converted.was_hex }));
            }
            println!("{}", if converted.was_hex { asm } else { hex });
        }
        Cmd::Disasm { script } => {
            let bytes = script_bytes(format, script)?;
            if json {
                return print_json(&json!({ "asm": codec::to_asm(&bytes)?, "hex": codec::to_hex(&bytes) }));
            }
            print!("{}", ScriptViewer::<PopulatedTransaction>::new(&bytes));
        }
        Cmd::Trace(source) => {
            let result = trace_source(format, source)?;
            info!("traced {} steps, valid: {}", result.steps.len(), result.valid);
            if json {
                return print_json(&result);
            }
            print_trace(&result);
        }
        Cmd::Validate(source) => {
            let verdict = validate_source(format, source)?;
            if json {
                return print_json(&verdict);
            }
            print_outcome(verdict.valid, verdict.rejection.map(|rejection| rejection.to_string()), &verdict.final_stack);
        }
        Cmd::HashPuzzle { secret, is_hex, hash } => {
            let puzzle = build_hash_puzzle(secret, *is_hex, *hash)?;
            if json {
                return print_json(&puzzle);
            }
            println!("locking:   {}", puzzle.locking_asm);
            println!("hex:       {}", puzzle.locking_hex);
            println!("unlocking: {}", puzzle.preimage_hex);
        }
        Cmd::RPuzzle { hash, nonce } => {
            let puzzle = match nonce {
                Some(nonce) => RPuzzle::from_nonce(&parse_nonce(nonce)?, *hash)?,
                None => generate_r_puzzle(*hash)?,
            };
            if json {
                return print_json(&puzzle);
            }
            println!("locking: {}", puzzle.locking_asm);
            println!("hex:     {}", puzzle.locking_hex);
            println!("r:       {}", puzzle.r_hex);
            println!("nonce:   {}", puzzle.nonce_hex);
            println!("Keep the nonce secret: anyone holding it can spend the output.");
        }
        Cmd::Templates { category, name } => {
            let selected: Vec<&templates::Template> = match name {
                Some(name) => vec![templates::find(name).ok_or_else(|| CliError::UnknownTemplate(name.clone()))?],
                None => templates::TEMPLATES.iter().filter(|template| category.is_none_or(|category| template.category == category)).collect(),
            };
            if json {
                return print_json(&selected);
            }
            selected.into_iter().for_each(print_template);
        }
        Cmd::Glossary { query } => {
            let entries = match query {
                Some(query) => vec![glossary::lookup(query).ok_or_else(|| CliError::UnknownOpcode(query.clone()))?],
                None => glossary::entries().iter().collect(),
            };
            if json {
                return print_json(&entries);
            }
            entries.into_iter().for_each(|entry| println!("{entry}"));
        }
        Cmd::Lock { key: wif, source, output_index, locking, amount, change } => {
            let key = key(args, wif)?;
            if let Some(change) = change {
                check_address(args, change)?;
            }
            let locking = script_asm(format, locking)?;
            let result = TransactionBuilder::new(args.settings.clone()).build_lock_transaction(
                &key,
                &tx_bytes(source)?,
                *output_index,
                &locking,
                *amount,
                change.as_ref(),
            )?;
            print_build(json, &result)?;
        }
        Cmd::Unlock { source, output_index, unlocking, destination, key: wif, lock_time } => {
            check_address(args, destination)?;
            let key = wif.as_deref().map(|wif| key(args, wif)).transpose()?;
            let builder = TransactionBuilder::new(args.settings.clone());
            let source = tx_bytes(source)?;
            let unlocking = &script_asm(format, unlocking)?;
            let result = match lock_time {
                Some(lock_time) => builder.build_unlock_transaction_with_lock_time(
                    &source,
                    *output_index,
                    unlocking,
                    destination,
                    key.as_ref(),
                    *lock_time,
                )?,
                None => builder.build_unlock_transaction(&source, *output_index, unlocking, destination, key.as_ref())?,
            };
            print_build(json, &result)?;
        }
        Cmd::RPuzzleUnlock { source, output_index, nonce, key: wif, destination } => {
            check_address(args, destination)?;
            let key = key(args, wif)?;
            let result = TransactionBuilder::new(args.settings.clone()).build_r_puzzle_unlock_transaction(
                &tx_bytes(source)?,
                *output_index,
                &parse_nonce(nonce)?,
                &key,
                destination,
            )?;
            print_build(json, &result)?;
        }
    }
    Ok(())
}
