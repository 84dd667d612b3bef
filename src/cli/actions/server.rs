use crate::{
    api::{self, AppState},
    backend::Backend,
    cli::telemetry,
    session::SessionConfig,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub session_secret: SecretString,
    pub session_cookie_name: String,
    pub session_cookie_secure: bool,
    pub session_ttl_seconds: u64,
}

impl Args {
    /// Build the shared request state.
    ///
    /// # Errors
    /// Returns an error if the session settings are rejected or the backend client
    /// cannot be built.
    pub fn app_state(&self) -> Result<AppState> {
        let config = SessionConfig::new(&*self.session_cookie_name, self.session_secret.clone())
            .context("Invalid session configuration")?
            .with_secure(self.session_cookie_secure)
            .with_ttl_seconds(self.session_ttl_seconds);

        let backend = Backend::new(&self.backend_url)
            .with_context(|| format!("Invalid backend url: {}", self.backend_url))?;

        Ok(AppState {
            backend,
            sessions: config.into(),
        })
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let state = args.app_state()?;
    let result = api::new(args.port, state).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        backend_url = %args.backend_url,
        session_cookie_name = %args.session_cookie_name,
        session_cookie_secure = args.session_cookie_secure,
        session_ttl_seconds = args.session_ttl_seconds,
        "Starting atrium"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(secret: &str, cookie_name: &str) -> Args {
        Args {
            port: 8080,
            backend_url: "http://127.0.0.1:8055".to_string(),
            session_secret: SecretString::from(secret),
            session_cookie_name: cookie_name.to_string(),
            session_cookie_secure: true,
            session_ttl_seconds: 60,
        }
    }

    #[test]
    fn app_state_from_args() {
        let state = args("0123456789abcdef0123456789abcdef", "_session").app_state();
        assert!(state.is_ok());
        if let Ok(state) = state {
            assert_eq!(state.backend.host(), "http://127.0.0.1:8055");
        }
    }

    #[test]
    fn weak_secret_is_rejected() {
        let result = args("short", "_session").app_state();
        assert!(result.is_err());
    }

    #[test]
    fn bad_cookie_name_is_rejected() {
        let result = args("0123456789abcdef0123456789abcdef", "bad name;").app_state();
        assert!(result.is_err());
    }
}
