//! `env_logger` setup for the command-line tool.
//!
//! `RUST_LOG` wins when set. Otherwise `--quiet` shows errors only, the
//! default shows warnings (the progress bar owns the terminal), and each
//! `-v` steps up through info, debug and trace.

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Call once, before any log macro fires.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let level_style = buf.default_level_style(level);
        if verbose >= 2 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                buf.timestamp_millis(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        }
    });

    // A second init (e.g. from tests) keeps the first logger.
    let _ = builder.try_init();
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_selection() {
        assert_eq!(determine_level(0, false), LevelFilter::Warn);
        assert_eq!(determine_level(1, false), LevelFilter::Info);
        assert_eq!(determine_level(2, false), LevelFilter::Debug);
        assert_eq!(determine_level(5, false), LevelFilter::Trace);
        assert_eq!(determine_level(3, true), LevelFilter::Error);
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_logging(0, true);
        init_logging(2, false);
    }
}
