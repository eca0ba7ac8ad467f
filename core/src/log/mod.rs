//! Logger initialisation shared by the lockbox binaries.
//!
//! Filters follow the `RUST_LOG` syntax: a bare level sets the root level and
//! `module=level` items tune individual modules, e.g. `info,lockbox_playground=trace`.

mod appender;
mod consts;
mod logger;

use appender::AppenderSpec;
use consts::{DEFAULT_LOGGER_ENV, ERR_LOG_FILE_NAME, LOG_FILE_NAME};
use log::LevelFilter;
use log4rs::config::{Config, Root};
use logger::Builder;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum LogError {
    #[error("Logger spec parsing error: {0}")]
    ParseLoggerSpecError(String),

    #[error("log directory {0} is not valid UTF-8")]
    InvalidLogDir(String),

    #[error("failed to create log appender: {0}")]
    Appender(String),

    #[error("failed to configure logger: {0}")]
    Config(String),
}

const CONSOLE_APPENDER: &str = "stderr";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Installs the global logger: a colored console appender on stderr and, when
/// `log_dir` is given, a rolling log file plus a warn-level error file.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<(), LogError> {
    let mut appenders = vec![AppenderSpec::console(CONSOLE_APPENDER, None)];
    if let Some(log_dir) = log_dir {
        appenders.push(AppenderSpec::roller(LOG_FILE_APPENDER, None, log_dir, LOG_FILE_NAME)?);
        appenders.push(AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(LevelFilter::Warn), log_dir, ERR_LOG_FILE_NAME)?);
    }
    let names: Vec<_> = appenders.iter().map(|x| x.name).collect();

    let level = LevelFilter::Info;
    let loggers = Builder::new().root_level(level).parse_env(DEFAULT_LOGGER_ENV).parse_expression(filters).build();

    let config = Config::builder()
        .appenders(appenders.into_iter().map(|x| x.appender()))
        .loggers(loggers.items())
        .build(Root::builder().appenders(names).build(loggers.root_level()))
        .map_err(|err| LogError::Config(err.to_string()))?;

    log4rs::init_config(config).map_err(|err| LogError::Config(err.to_string()))?;
    Ok(())
}
