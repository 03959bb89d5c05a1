#![deny(unused_crate_dependencies)]

//! Logging setup shared by the indexer binaries.
//!
//! The format of the logs in `stdout` is `plain` or `json` and is set by the
//! `MISC_LOG_FORMAT` env variable, the filter is read from `RUST_LOG`.
//!
//! If `MISC_SENTRY_URL` is set errors are also reported to sentry
//! <https://docs.sentry.io/platforms/rust/>

use std::{backtrace::Backtrace, borrow::Cow, str::FromStr};

use sentry::{types::Dsn, ClientInitGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines.
    Plain,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(format!("unexpected log format {other}")),
        }
    }
}

fn get_sentry_url() -> Option<Dsn> {
    let url = std::env::var("MISC_SENTRY_URL").ok()?;

    match Dsn::from_str(&url) {
        Ok(dsn) => Some(dsn),
        Err(e) => {
            tracing::warn!("ignoring malformed MISC_SENTRY_URL: {e}");
            None
        }
    }
}

/// Initialize logging with tracing and set up log format
///
/// An unknown `MISC_LOG_FORMAT` falls back to `plain` with a warning.
///
/// If the sentry URL is provided via an environment variable, this function will also initialize sentry.
/// The returned guard must be kept alive for events to be flushed.
#[must_use]
pub fn init() -> Option<ClientInitGuard> {
    let requested = std::env::var("MISC_LOG_FORMAT").unwrap_or_else(|_| "plain".to_string());
    let format = requested.parse::<LogFormat>();

    match format {
        Ok(LogFormat::Json) => {
            let timer = fmt::time::UtcTime::rfc_3339();
            // must be set before sentry hook for sentry to function
            install_json_panic_hook();

            tracing_subscriber::registry()
                .with(
                    fmt::Layer::default()
                        .with_file(true)
                        .with_line_number(true)
                        .with_timer(timer)
                        .json(),
                )
                .with(EnvFilter::from_default_env())
                .init();
        }
        Ok(LogFormat::Plain) | Err(_) => {
            tracing_subscriber::registry()
                .with(fmt::Layer::default())
                .with(EnvFilter::from_default_env())
                .init();
        }
    }

    if let Err(e) = format {
        tracing::warn!("{e}, logging in plain format");
    }

    get_sentry_url().map(|sentry_url| {
        let environment = std::env::var("MISC_SENTRY_ENVIRONMENT").ok();

        let options = sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: environment.map(Cow::from),
            attach_stacktrace: true,
            ..Default::default()
        };

        tracing::info!("reporting errors to sentry");

        sentry::init((sentry_url, options))
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "Panic occurred without additional info"
    }
}

/// Format panics as json log lines
fn install_json_panic_hook() {
    std::panic::set_hook(Box::new(move |panic_info| {
        let backtrace = Backtrace::capture();
        let timestamp = chrono::Utc::now();

        let location = panic_info
            .location()
            .map(|val| val.to_string())
            .unwrap_or_else(|| "Unknown location".to_owned());

        println!(
            "{}",
            serde_json::json!({
                "timestamp": timestamp.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string(),
                "level": "CRITICAL",
                "fields": {
                    "message": panic_message(panic_info.payload()),
                    "location": location,
                    "backtrace": backtrace.to_string(),
                }
            })
        );
    }));
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn log_format_parses() {
        assert_eq!("plain".parse::<LogFormat>(), Ok(LogFormat::Plain));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let owned: Box<dyn std::any::Any + Send> = Box::new("boom".to_string());
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("bang");
        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(owned.as_ref()), "boom");
        assert_eq!(panic_message(borrowed.as_ref()), "bang");
        assert_eq!(
            panic_message(other.as_ref()),
            "Panic occurred without additional info"
        );
    }
}
