//! Server configuration, read from environment variables with logged defaults.

use std::env;

use chrono::Duration;
use log::*;
use md_common::Secret;
use rand::{distributions::Alphanumeric, Rng};

const DEFAULT_MEALDROP_HOST: &str = "127.0.0.1";
const DEFAULT_MEALDROP_PORT: u16 = 8480;
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(12);
/// Per-order broadcast buffer for the location relay. Small on purpose.
const DEFAULT_RELAY_BUFFER: usize = 16;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Gateway credentials. Either one missing means the marketplace runs cash-on-delivery only.
    pub gateway_key_id: Option<String>,
    pub gateway_key_secret: Option<Secret<String>>,
    pub relay_buffer: usize,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub token_lifetime: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { jwt_secret: Secret::new(random_secret()), token_lifetime: DEFAULT_TOKEN_LIFETIME }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, String> {
        let jwt_secret = env::var("MEALDROP_JWT_SECRET").map_err(|_| "MEALDROP_JWT_SECRET is not set".to_string())?;
        if jwt_secret.len() < 32 {
            return Err("MEALDROP_JWT_SECRET must be at least 32 characters".into());
        }
        Ok(Self { jwt_secret: Secret::new(jwt_secret), token_lifetime: DEFAULT_TOKEN_LIFETIME })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MEALDROP_HOST.to_string(),
            port: DEFAULT_MEALDROP_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            gateway_key_id: None,
            gateway_key_secret: None,
            relay_buffer: DEFAULT_RELAY_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MEALDROP_HOST").ok().unwrap_or_else(|| DEFAULT_MEALDROP_HOST.into());
        let port = env::var("MEALDROP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MEALDROP_PORT. {e} Using the default, \
                         {DEFAULT_MEALDROP_PORT}, instead."
                    );
                    DEFAULT_MEALDROP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MEALDROP_PORT);
        let database_url = env::var("MEALDROP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MEALDROP_DATABASE_URL is not set. Please set it to the URL for the MealDrop database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. A random JWT \
                 secret will be used; every issued token dies with this process."
            );
            AuthConfig::default()
        });
        let gateway_key_id = env::var("MEALDROP_GATEWAY_KEY_ID").ok().filter(|s| !s.is_empty());
        let gateway_key_secret =
            env::var("MEALDROP_GATEWAY_KEY_SECRET").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if gateway_key_id.is_none() || gateway_key_secret.is_none() {
            warn!(
                "🪛️ MEALDROP_GATEWAY_KEY_ID / MEALDROP_GATEWAY_KEY_SECRET are not both set. Online payments will be \
                 disabled and the marketplace runs cash-on-delivery only."
            );
        }
        let relay_buffer = env::var("MEALDROP_RELAY_BUFFER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_RELAY_BUFFER);
        Self { host, port, database_url, auth, gateway_key_id, gateway_key_secret, relay_buffer }
    }
}

fn random_secret() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect()
}
