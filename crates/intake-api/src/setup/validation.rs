//! Configuration validation
//!
//! Fails fast at startup on settings that would be unsafe or unusable at runtime.

use anyhow::Result;
use intake_core::Config;

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.trusted_proxy_count() > 10 {
        tracing::warn!(
            trusted_proxy_count = config.trusted_proxy_count(),
            "TRUSTED_PROXY_COUNT is very high - ensure this matches your actual proxy setup"
        );
    }

    if config.is_production() && config.trusted_proxy_count() == 0 {
        tracing::warn!(
            "TRUSTED_PROXY_COUNT is 0 - admission control keys on the socket peer, which is the proxy address behind a load balancer"
        );
    }

    if config.request_timeout_secs() <= config.storage_timeout_secs() {
        tracing::warn!(
            request_timeout_secs = config.request_timeout_secs(),
            storage_timeout_secs = config.storage_timeout_secs(),
            "Request timeout does not exceed storage timeout; slow uploads will surface as request timeouts"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::ServerConfig;

    #[test]
    fn development_defaults_are_valid() {
        assert!(validate_config(&Config::new(ServerConfig::default())).is_ok());
    }

    #[test]
    fn zero_admission_limit_is_rejected() {
        let config = Config::new(ServerConfig {
            admission_limit: 0,
            ..ServerConfig::default()
        });
        assert!(validate_config(&config).is_err());
    }
}
