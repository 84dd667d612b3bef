//! Map validated CLI arguments to an action.

use crate::backend::DEFAULT_BACKEND_URL;
use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{session, ARG_BACKEND_URL, ARG_PORT};
use anyhow::{Context, Result};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the backend URL is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let backend_url = matches
        .get_one::<String>(ARG_BACKEND_URL)
        .cloned()
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

    Url::parse(&backend_url).with_context(|| format!("invalid backend url: {backend_url}"))?;

    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        backend_url,
        session_secret: session_opts.secret,
        session_cookie_name: session_opts.cookie_name,
        session_cookie_secure: session_opts.cookie_secure,
        session_ttl_seconds: session_opts.ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn builds_server_action() {
        temp_env::with_vars(
            [
                ("ATRIUM_BACKEND_URL", Some("https://cms.example.com")),
                ("ATRIUM_SESSION_SECRET", Some(SECRET)),
                ("ATRIUM_SESSION_COOKIE_SECURE", Some("true")),
                ("ATRIUM_PORT", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["atrium"]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected a server action");
                };
                assert_eq!(args.port, 8080);
                assert_eq!(args.backend_url, "https://cms.example.com");
                assert_eq!(args.session_secret.expose_secret(), SECRET);
                assert!(args.session_cookie_secure);
            },
        );
    }

    #[test]
    fn invalid_backend_url() {
        temp_env::with_vars(
            [
                ("ATRIUM_BACKEND_URL", Some("not a url")),
                ("ATRIUM_SESSION_SECRET", Some(SECRET)),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["atrium"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("invalid backend url: not a url"));
                }
            },
        );
    }
}
