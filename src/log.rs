//! Initialisation and configuration of the application's logging system.
//!
//! Messages go to the console (stdout for ordinary messages, stderr for
//! warnings and errors) with optional colourisation, and additionally to a
//! plain-text log file when a log directory is given. The log level comes from
//! the `CAPMATCH_LOG_LEVEL` environment variable, falling back to the settings
//! file and finally to `info`.
use anyhow::{Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;

/// The default log level for the program.
///
/// Used as a fallback if the user hasn't specified something else with the
/// `CAPMATCH_LOG_LEVEL` environment variable or the settings file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The file name for the log file
const LOG_FILE_NAME: &str = "capmatch.log";

/// Initialise the program logger using the `fern` logging library.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in the settings file
/// * `log_file_dir`: Where to create a log file (if `Some`)
pub fn init(log_level_from_settings: Option<&str>, log_file_dir: Option<&Path>) -> Result<()> {
    let log_level = env::var("CAPMATCH_LOG_LEVEL").unwrap_or_else(|_| {
        log_level_from_settings
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    });
    let log_level = parse_log_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    // Apply colours only when the stream is a terminal
    let colour_stdout = std::io::stdout().is_terminal();
    let colour_stderr = std::io::stderr().is_terminal();

    let mut dispatch = Dispatch::new()
        .chain(
            // Ordinary messages go to stdout
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, colour_stdout, &colours);
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            // Warnings and errors go to stderr
            Dispatch::new()
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, colour_stderr, &colours);
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        );

    if let Some(dir) = log_file_dir {
        let log_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(dir.join(LOG_FILE_NAME))?;
        dispatch = dispatch.chain(
            Dispatch::new()
                .format(write_log_plain)
                .level(log_level)
                .chain(log_file),
        );
    }

    dispatch.apply().expect("Logger already initialised");

    Ok(())
}

/// Convert a log level string to a `log::LevelFilter`
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {}", unknown),
    };
    Ok(level)
}

/// Write to the log in the format we want for capmatch
fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

/// Write to the log with no colours
fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

/// Write to the log with optional colours
fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record.target(), message);
    } else {
        write_log_plain(out, message, record);
    }
}
