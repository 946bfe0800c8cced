use std::env;

use chrono::Duration;
use log::*;
use mkt_common::{helpers::parse_boolean_flag, Secret, DEFAULT_CURRENCY_CODE};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use razorpay_tools::RazorpayConfig;

use crate::errors::ServerError;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/market.db";
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(48);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Razorpay API credentials. If these are incomplete, the payment routes return 503.
    pub razorpay: RazorpayConfig,
    /// The secret Razorpay uses to sign webhook deliveries.
    pub webhook_secret: Secret<String>,
    /// The time an order may sit unpaid before it is cancelled and its stock released.
    pub unpaid_order_timeout: Duration,
    /// Whether the unpaid order expiry worker runs at all.
    pub expiry_worker_enabled: bool,
    /// The currency new orders are priced in.
    pub currency: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            razorpay: RazorpayConfig::default(),
            webhook_secret: Secret::default(),
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            expiry_worker_enabled: true,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ MKT_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let razorpay = RazorpayConfig::new_from_env_or_default();
        if !razorpay.is_configured() {
            warn!("🪛️ Razorpay credentials are incomplete. Payment routes will return 503 until they are configured.");
        }
        let webhook_secret = env::var("MKT_RAZORPAY_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_RAZORPAY_WEBHOOK_SECRET is not set. Webhook deliveries will be refused.");
            String::default()
        });
        let unpaid_order_timeout = configure_unpaid_order_timeout();
        let expiry_worker_enabled = parse_boolean_flag(env::var("MKT_EXPIRY_WORKER").ok(), true);
        if !expiry_worker_enabled {
            info!("🪛️ The unpaid order expiry worker is disabled");
        }
        let currency = env::var("MKT_CURRENCY")
            .ok()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        Self {
            host,
            port,
            database_url,
            auth,
            razorpay,
            webhook_secret: Secret::new(webhook_secret),
            unpaid_order_timeout,
            expiry_worker_enabled,
            currency,
        }
    }
}

fn configure_unpaid_order_timeout() -> Duration {
    env::var("MKT_UNPAID_ORDER_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ MKT_UNPAID_ORDER_TIMEOUT is not set. Using the default value of {} hrs.",
                DEFAULT_UNPAID_ORDER_TIMEOUT.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for MKT_UNPAID_ORDER_TIMEOUT. {e}"))
                .and_then(|h| {
                    if h > 0 {
                        Ok(Duration::hours(h))
                    } else {
                        warn!("🪛️ MKT_UNPAID_ORDER_TIMEOUT must be a positive number of hours. Got {h}.");
                        Err(())
                    }
                })
        })
        .ok()
        .unwrap_or(DEFAULT_UNPAID_ORDER_TIMEOUT)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The shared secret used to sign and verify HS256 access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. Tokens issued \
             elsewhere will not be accepted, and DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new(jwt_secret: &str) -> Self {
        Self { jwt_secret: Secret::new(jwt_secret.to_string()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("MKT_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [MKT_JWT_SECRET]")))?;
        if secret.trim().len() < 16 {
            return Err(ServerError::ConfigurationError(
                "MKT_JWT_SECRET is too short. Use at least 16 characters.".to_string(),
            ));
        }
        Ok(Self::new(&secret))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.port, 9000);
        assert_eq!(config.currency, "INR");
        assert_eq!(config.unpaid_order_timeout, Duration::hours(48));
        assert!(config.expiry_worker_enabled);
        assert!(!config.razorpay.is_configured());
        assert!(config.webhook_secret.is_empty());
    }

    #[test]
    fn random_jwt_secrets_differ() {
        let a = AuthConfig::default();
        let b = AuthConfig::default();
        assert_eq!(a.jwt_secret.reveal().len(), 48);
        assert_ne!(a.jwt_secret.reveal(), b.jwt_secret.reveal());
    }
}
