use clap::{Arg, ArgAction, ArgMatches, Command, ValueEnum, arg, parser::ValueSource::DefaultValue};
use lockbox_addresses::{Address, Prefix};
use lockbox_playground::{Settings, templates::Category};
use lockbox_txscript::PuzzleHash;
use std::ffi::OsString;

/// Where the scripts of a trace come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptSource {
    /// ASM or hex given directly, run in a synthetic spend context
    Scripts { locking: String, unlocking: String },
    /// A spending transaction and the transaction holding the spent output, both hex
    Transactions { source: String, spending: String, input_index: usize, output_index: usize },
}

/// How script arguments are written on the command line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScriptFormat {
    /// Opcode names and hex data pushes
    #[default]
    Asm,
    /// Serialized script bytes
    Hex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    Convert { input: String },
    Disasm { script: String },
    Trace(ScriptSource),
    Validate(ScriptSource),
    HashPuzzle { secret: String, is_hex: bool, hash: PuzzleHash },
    RPuzzle { hash: Option<PuzzleHash>, nonce: Option<String> },
    Templates { category: Option<Category>, name: Option<String> },
    Glossary { query: Option<String> },
    Lock { key: String, source: String, output_index: usize, locking: String, amount: u64, change: Option<Address> },
    Unlock { source: String, output_index: usize, unlocking: String, destination: Address, key: Option<String>, lock_time: Option<u32> },
    RPuzzleUnlock { source: String, output_index: usize, nonce: String, key: String, destination: Address },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub log_dir: Option<String>,
    pub log_level: String,
    pub json: bool,
    pub script_format: ScriptFormat,
    pub settings: Settings,
    pub command: Cmd,
}

impl Args {
    pub fn parse<I, T>(itr: I) -> Result<Args, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let m: ArgMatches = cli().try_get_matches_from(itr)?;

        let mut settings = match m.get_one::<String>("configfile") {
            Some(config_file) => Settings::load(config_file).map_err(|err| {
                clap::Error::raw(clap::error::ErrorKind::ValueValidation, format!("failed loading config file, reason: {err}"))
            })?,
            None => Settings::default(),
        };
        if let Some(&fee_rate) = m.get_one::<f64>("fee-rate") {
            settings = settings.with_fee_rate(fee_rate).map_err(|err| clap::Error::raw(clap::error::ErrorKind::ValueValidation, err))?;
        }
        if m.get_flag("testnet") {
            settings.network = Prefix::Testnet;
        }

        let (name, sub) = m.subcommand().ok_or_else(|| clap::Error::new(clap::error::ErrorKind::MissingSubcommand))?;
        let command = match name {
            "convert" => Cmd::Convert { input: required(sub, "input")? },
            "disasm" => Cmd::Disasm { script: required(sub, "script")? },
            "trace" => Cmd::Trace(script_source(sub)?),
            "validate" => Cmd::Validate(script_source(sub)?),
            "hash-puzzle" => Cmd::HashPuzzle {
                secret: required(sub, "secret")?,
                is_hex: sub.get_flag("hex"),
                hash: arg_match_unwrap_or(sub, "hash", PuzzleHash::Sha256),
            },
            "rpuzzle" => Cmd::RPuzzle { hash: sub.get_one::<PuzzleHash>("hash").copied(), nonce: sub.get_one::<String>("nonce").cloned() },
            "templates" => Cmd::Templates {
                category: sub.get_one::<String>("category").map(|category| parse_category(category)).transpose()?,
                name: sub.get_one::<String>("name").cloned(),
            },
            "glossary" => Cmd::Glossary { query: sub.get_one::<String>("query").cloned() },
            "lock" => Cmd::Lock {
                key: required(sub, "key")?,
                source: required(sub, "source")?,
                output_index: arg_match_unwrap_or(sub, "output", 0),
                locking: required(sub, "locking")?,
                amount: required(sub, "amount")?,
                change: sub.get_one::<Address>("change").cloned(),
            },
            "unlock" => Cmd::Unlock {
                source: required(sub, "source")?,
                output_index: arg_match_unwrap_or(sub, "output", 0),
                unlocking: required(sub, "unlocking")?,
                destination: required(sub, "destination")?,
                key: sub.get_one::<String>("key").cloned(),
                lock_time: sub.get_one::<u32>("lock-time").copied(),
            },
            "rpuzzle-unlock" => Cmd::RPuzzleUnlock {
                source: required(sub, "source")?,
                output_index: arg_match_unwrap_or(sub, "output", 0),
                nonce: required(sub, "nonce")?,
                key: required(sub, "key")?,
                destination: required(sub, "destination")?,
            },
            _ => return Err(clap::Error::new(clap::error::ErrorKind::InvalidSubcommand)),
        };

        Ok(Args {
            log_dir: m.get_one::<String>("logdir").cloned(),
            log_level: arg_match_unwrap_or::<String>(&m, "log_level", "info".to_string()),
            json: m.get_flag("json"),
            script_format: m.get_one::<ScriptFormat>("format").copied().unwrap_or_default(),
            settings,
            command,
        })
    }
}

pub fn parse_args() -> Args {
    match Args::parse(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => err.exit(),
    }
}

fn script_arg(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).value_name("SCRIPT").value_parser(clap::value_parser!(String)).help(help)
}

fn source_args(cmd: Command) -> Command {
    cmd.arg(arg!(--source <TX_HEX> "Serialized transaction holding the output to spend.").required(true)).arg(
        Arg::new("output")
            .long("output")
            .value_name("INDEX")
            .default_value("0")
            .value_parser(clap::value_parser!(usize))
            .help("Index of the output to spend."),
    )
}

fn script_source_args(cmd: Command) -> Command {
    cmd.arg(script_arg("locking", "Locking script.").conflicts_with("source"))
        .arg(script_arg("unlocking", "Unlocking script.").conflicts_with("source"))
        .arg(arg!(--source <TX_HEX> "Transaction holding the spent output, for a real spend context.").requires("spending"))
        .arg(arg!(--spending <TX_HEX> "Transaction spending it.").requires("source"))
        .arg(Arg::new("input").long("input").value_name("INDEX").default_value("0").value_parser(clap::value_parser!(usize)))
        .arg(Arg::new("output").long("output").value_name("INDEX").default_value("0").value_parser(clap::value_parser!(usize)))
}

fn hash_arg() -> Arg {
    Arg::new("hash")
        .long("hash")
        .value_name("ALGORITHM")
        .value_parser(clap::value_parser!(PuzzleHash))
        .help("One of SHA256, HASH256, HASH160, RIPEMD160, SHA1.")
}

pub fn cli() -> Command {
    Command::new("lockbox")
        .about(format!("{} v{}", env!("CARGO_PKG_DESCRIPTION"), env!("CARGO_PKG_VERSION")))
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg(arg!(-C --configfile <CONFIG_FILE> "Path of config file."))
        .arg(arg!(--logdir <LOG_DIR> "Directory to log output."))
        .arg(
            Arg::new("log_level")
                .short('d')
                .long("loglevel")
                .env("LOCKBOX_LOG_LEVEL")
                .value_name("LEVEL")
                .default_value("info")
                .help("Logging level {off, error, warn, info, debug, trace}\n-- You may also specify <module>=<level>,... to set the level of individual modules."),
        )
        .arg(arg!(--json "Print results as JSON.").global(true))
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .value_parser(clap::value_parser!(ScriptFormat))
                .default_value("asm")
                .global(true)
                .help("How script arguments are written: asm (hex tokens are data pushes) or hex (serialized script)."),
        )
        .arg(
            Arg::new("fee-rate")
                .long("fee-rate")
                .value_name("SAT_PER_BYTE")
                .value_parser(clap::value_parser!(f64))
                .help("Fee rate in satoshis per byte (default: 0.5)."),
        )
        .arg(Arg::new("testnet").long("testnet").action(ArgAction::SetTrue).help("Use testnet addresses and keys."))
        .subcommand(Command::new("convert").about("Converts script hex to ASM, or echoes ASM.").arg(arg!(<INPUT> "Script hex or ASM.").id("input")))
        .subcommand(Command::new("disasm").about("Lists a script one opcode per line.").arg(arg!(<SCRIPT> "Script, see --format.").id("script")))
        .subcommand(script_source_args(Command::new("trace").about("Runs a script pair step by step, printing the stacks after every opcode.")))
        .subcommand(script_source_args(Command::new("validate").about("Runs a script pair and reports whether it is accepted.")))
        .subcommand(
            Command::new("hash-puzzle")
                .about("Builds a locking script that opens with the preimage of a digest.")
                .arg(arg!(<SECRET> "The secret.").id("secret"))
                .arg(arg!(--hex "The secret is hex encoded bytes, not text."))
                .arg(hash_arg().default_value("SHA256")),
        )
        .subcommand(
            Command::new("rpuzzle")
                .about("Builds a locking script that opens with any signature made using a secret nonce.")
                .arg(hash_arg().help("Commit to a hash of R instead of R itself."))
                .arg(arg!(--nonce <NONCE_HEX> "Use this nonce instead of a fresh random one.")),
        )
        .subcommand(
            Command::new("templates")
                .about("Lists example script pairs.")
                .arg(arg!(--category <CATEGORY> "Only this category."))
                .arg(arg!(--name <NAME> "Show a single template.")),
        )
        .subcommand(Command::new("glossary").about("Describes opcodes.").arg(arg!([QUERY] "Opcode name or code.").id("query")))
        .subcommand(
            source_args(Command::new("lock").about("Spends a pay-to-pubkey-hash output into a custom locking script."))
                .arg(arg!(--key <WIF> "Key owning the source output.").required(true))
                .arg(script_arg("locking", "Locking script of the new output.").required(true))
                .arg(arg!(--amount <SATOSHIS> "Value of the new output.").required(true).value_parser(clap::value_parser!(u64)))
                .arg(arg!(--change <ADDRESS> "Change address (default: the key's address).").value_parser(clap::value_parser!(Address))),
        )
        .subcommand(
            source_args(Command::new("unlock").about("Spends a custom output with the given unlocking script."))
                .arg(
                    script_arg("unlocking", "Unlocking script, may contain <sig> and <pubkey>.")
                        .required(true)
                        .allow_hyphen_values(true),
                )
                .arg(arg!(--destination <ADDRESS> "Address receiving the value.").required(true).value_parser(clap::value_parser!(Address)))
                .arg(arg!(--key <WIF> "Key for the <sig> and <pubkey> placeholders."))
                .arg(arg!(--"lock-time" <LOCK_TIME> "Transaction lock time.").value_parser(clap::value_parser!(u32))),
        )
        .subcommand(
            source_args(Command::new("rpuzzle-unlock").about("Spends an R-puzzle output."))
                .arg(arg!(--nonce <NONCE_HEX> "The puzzle nonce.").required(true))
                .arg(arg!(--key <WIF> "Any key, it signs using the nonce.").required(true))
                .arg(arg!(--destination <ADDRESS> "Address receiving the value.").required(true).value_parser(clap::value_parser!(Address))),
        )
}

fn required<T: Clone + Send + Sync + 'static>(m: &ArgMatches, arg_id: &str) -> Result<T, clap::Error> {
    m.get_one::<T>(arg_id)
        .cloned()
        .ok_or_else(|| clap::Error::raw(clap::error::ErrorKind::MissingRequiredArgument, format!("missing argument `{arg_id}`\n")))
}

fn arg_match_unwrap_or<T: Clone + Send + Sync + 'static>(m: &ArgMatches, arg_id: &str, default: T) -> T {
    m.get_one::<T>(arg_id).cloned().filter(|_| m.value_source(arg_id) != Some(DefaultValue)).unwrap_or(default)
}

fn script_source(m: &ArgMatches) -> Result<ScriptSource, clap::Error> {
    let input_index = m.get_one::<usize>("input").copied().unwrap_or_default();
    let output_index = m.get_one::<usize>("output").copied().unwrap_or_default();
    match (m.get_one::<String>("source"), m.get_one::<String>("spending")) {
        (Some(source), Some(spending)) => {
            Ok(ScriptSource::Transactions { source: source.clone(), spending: spending.clone(), input_index, output_index })
        }
        _ => Ok(ScriptSource::Scripts {
            locking: m.get_one::<String>("locking").cloned().unwrap_or_default(),
            unlocking: m.get_one::<String>("unlocking").cloned().unwrap_or_default(),
        }),
    }
}

fn parse_category(name: &str) -> Result<Category, clap::Error> {
    Category::ALL.into_iter().find(|category| category.as_str().eq_ignore_ascii_case(name)).ok_or_else(|| {
        let names: Vec<_> = Category::ALL.iter().map(|category| category.as_str()).collect();
        clap::Error::raw(clap::error::ErrorKind::InvalidValue, format!("unknown category `{name}`, expected one of: {}\n", names.join(", ")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_consensus_core::keys::PrivateKey;

    #[test]
    fn test_trace_scripts() {
        let args = Args::parse(["lockbox", "trace", "--locking", "OP_ADD OP_5 OP_EQUAL", "--unlocking", "OP_2 OP_3"]).unwrap();
        assert_eq!(
            args.command,
            Cmd::Trace(ScriptSource::Scripts { locking: "OP_ADD OP_5 OP_EQUAL".into(), unlocking: "OP_2 OP_3".into() })
        );
        assert!(!args.json);
        assert_eq!(args.script_format, ScriptFormat::Asm);
        assert_eq!(args.log_level, "info");
        assert_eq!(args.settings, Settings::default());
    }

    #[test]
    fn test_trace_transactions() {
        let args = Args::parse(["lockbox", "--json", "validate", "--source", "aa", "--spending", "bb", "--input", "2"]).unwrap();
        assert!(args.json);
        assert_eq!(
            args.command,
            Cmd::Validate(ScriptSource::Transactions { source: "aa".into(), spending: "bb".into(), input_index: 2, output_index: 0 })
        );
        assert!(Args::parse(["lockbox", "trace", "--source", "aa"]).is_err());
    }

    #[test]
    fn test_global_settings() {
        let args = Args::parse(["lockbox", "--fee-rate", "2", "--testnet", "-d", "debug", "glossary", "OP_ADD"]).unwrap();
        assert_eq!(args.settings.fee_rate, 2.0);
        assert_eq!(args.settings.network, Prefix::Testnet);
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.command, Cmd::Glossary { query: Some("OP_ADD".into()) });
        assert!(Args::parse(["lockbox", "--fee-rate", "-1", "glossary"]).is_err());
    }

    #[test]
    fn test_puzzles() {
        let args = Args::parse(["lockbox", "hash-puzzle", "hello"]).unwrap();
        assert_eq!(args.command, Cmd::HashPuzzle { secret: "hello".into(), is_hex: false, hash: PuzzleHash::Sha256 });
        let args = Args::parse(["lockbox", "hash-puzzle", "--hex", "--hash", "hash160", "abcd"]).unwrap();
        assert_eq!(args.command, Cmd::HashPuzzle { secret: "abcd".into(), is_hex: true, hash: PuzzleHash::Hash160 });
        let args = Args::parse(["lockbox", "rpuzzle"]).unwrap();
        assert_eq!(args.command, Cmd::RPuzzle { hash: None, nonce: None });
    }

    #[test]
    fn test_templates() {
        let args = Args::parse(["lockbox", "templates", "--category", "time locks"]).unwrap();
        assert_eq!(args.command, Cmd::Templates { category: Some(Category::TimeLocks), name: None });
        assert!(Args::parse(["lockbox", "templates", "--category", "nope"]).is_err());
    }

    #[test]
    fn test_unlock() {
        let destination = PrivateKey::from_slice(&[1; 32], Prefix::Mainnet).unwrap().address();
        let args = Args::parse([
            "lockbox",
            "unlock",
            "--source",
            "00",
            "--output",
            "1",
            "--unlocking",
            "<sig> <pubkey>",
            "--destination",
            &destination.to_string(),
            "--lock-time",
            "500000000",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Cmd::Unlock {
                source: "00".into(),
                output_index: 1,
                unlocking: "<sig> <pubkey>".into(),
                destination,
                key: None,
                lock_time: Some(500_000_000),
            }
        );
        assert!(Args::parse(["lockbox", "unlock", "--source", "00", "--unlocking", "OP_1"]).is_err());
    }

    #[test]
    fn test_script_format() {
        let args = Args::parse(["lockbox", "trace", "--format", "hex", "--locking", "935587", "--unlocking", "5253"]).unwrap();
        assert_eq!(args.script_format, ScriptFormat::Hex);
        let args = Args::parse(["lockbox", "--format", "hex", "disasm", "935587"]).unwrap();
        assert_eq!(args.script_format, ScriptFormat::Hex);
        assert!(Args::parse(["lockbox", "--format", "binary", "disasm", "935587"]).is_err());
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Args::parse(["lockbox"]).is_err());
    }
}
