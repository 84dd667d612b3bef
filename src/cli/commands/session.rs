use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::session::{DEFAULT_COOKIE_NAME, DEFAULT_TTL_SECONDS};

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to encrypt the session cookie (at least 32 characters)")
                .env("ATRIUM_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Name of the session cookie")
                .env("ATRIUM_SESSION_COOKIE_NAME")
                .default_value(DEFAULT_COOKIE_NAME),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("ATRIUM_SESSION_COOKIE_SECURE")
                .num_args(0..=1)
                .default_value("false")
                .default_missing_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("ATRIUM_SESSION_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the session secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .map(|secret| SecretString::from(secret.as_str()))
            .context("missing required argument: --session-secret")?;

        Ok(Self {
            secret,
            cookie_name: matches
                .get_one::<String>(ARG_SESSION_COOKIE_NAME)
                .cloned()
                .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            cookie_secure: matches
                .get_one::<bool>(ARG_SESSION_COOKIE_SECURE)
                .copied()
                .unwrap_or(false),
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_TTL_SECONDS),
        })
    }
}
