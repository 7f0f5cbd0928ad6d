/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Logging and terminal output macros.
//!
//! Everything goes through the [log](https://docs.rs/log) facade, so a library
//! user decides where the messages end up. The `dynGL` binary installs
//! `env_logger`, which means `RUST_LOG=dynGL=debug` shows the [log_dbg] output
//! and `RUST_LOG=dynGL::binding=debug` narrows it down to a single module.

/// Logs a message unconditionally. Use this for errors or warnings.
///
/// The message is prefixed with the module path, so it is clear where it comes
/// from.
macro_rules! log {
    ($($arg:tt)+) => {
        ::log::warn!("{}: {}", module_path!(), format_args!($($arg)+))
    }
}

/// Like [log], but the message is only shown if debug output is enabled for the
/// module where it is used. This can be used for verbose things only needed
/// when debugging.
macro_rules! log_dbg {
    ($($arg:tt)+) => {
        ::log::debug!("{}: {}", module_path!(), format_args!($($arg)+))
    }
}

/// Print a message (with implicit newline). This should be used for all
/// output of the command-line tool that is meant for the user rather than for
/// debugging, so it is not subject to log filtering.
///
/// Prefer [log] or [log_dbg] for errors and warnings.
macro_rules! echo {
    ($($arg:tt)+) => {
        println!($($arg)+)
    };
    () => {
        println!()
    };
}

/// Set up the `env_logger` backend for the command-line tool. Warnings are
/// shown by default, `RUST_LOG` overrides that.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .try_init();
}
