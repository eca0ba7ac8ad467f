//! Script playground: ASM conversion, step by step script tracing, puzzle
//! locks and construction of the transactions that fund and spend them.

pub mod api;
pub mod builder;
pub mod codec;
pub mod context;
pub mod error;
pub mod glossary;
pub mod puzzle;
pub mod settings;
pub mod templates;
pub mod trace;

pub use builder::{BuildResult, InputSigner, StandardSigner, TransactionBuilder};
pub use codec::{detect_and_convert, parse_asm, to_asm, to_hex};
pub use context::SpendContext;
pub use error::{Error, ErrorKind, Rejection, Result};
pub use puzzle::{HashPuzzle, RPuzzle, build_hash_puzzle, generate_r_puzzle};
pub use settings::Settings;
pub use trace::{ExecutionStep, TraceResult, Verdict, run_trace, run_trace_with_real_context, validate};
