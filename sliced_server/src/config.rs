use std::env;

use log::*;
use sliced_common::Secret;
use sliced_engine::PLATFORM_FEE_BPS;

const DEFAULT_SLICED_HOST: &str = "127.0.0.1";
const DEFAULT_SLICED_PORT: u16 = 8480;
const DEFAULT_GATEWAY_URL: &str = "https://api.mercadopago.com";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The platform's cut of each pot, in basis points.
    pub platform_fee_bps: i64,
    /// Payment gateway credentials and endpoint.
    pub gateway: GatewayConfig,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub access_token: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SLICED_HOST.to_string(),
            port: DEFAULT_SLICED_PORT,
            database_url: String::default(),
            platform_fee_bps: PLATFORM_FEE_BPS,
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SLICED_HOST").ok().unwrap_or_else(|| DEFAULT_SLICED_HOST.into());
        let port = env::var("SLICED_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SLICED_PORT. {e} Using the default, {DEFAULT_SLICED_PORT}, \
                         instead."
                    );
                    DEFAULT_SLICED_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SLICED_PORT);
        let database_url = env::var("SLICED_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SLICED_DATABASE_URL is not set. Please set it to the URL for the SLICED database.");
            String::default()
        });
        let platform_fee_bps = env::var("SLICED_PLATFORM_FEE_BPS")
            .map(|s| {
                s.parse::<i64>().ok().filter(|bps| (0..=10_000).contains(bps)).unwrap_or_else(|| {
                    error!(
                        "🪛️ {s} is not a valid basis-point value for SLICED_PLATFORM_FEE_BPS. Using the default, \
                         {PLATFORM_FEE_BPS}, instead."
                    );
                    PLATFORM_FEE_BPS
                })
            })
            .ok()
            .unwrap_or(PLATFORM_FEE_BPS);
        let gateway = GatewayConfig::from_env_or_default();
        Self { host, port, database_url, platform_fee_bps, gateway }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("SLICED_GATEWAY_URL").ok().unwrap_or_else(|| {
            info!("🪛️ SLICED_GATEWAY_URL is not set. Using the default, {DEFAULT_GATEWAY_URL}.");
            DEFAULT_GATEWAY_URL.into()
        });
        let access_token = env::var("SLICED_GATEWAY_TOKEN").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SLICED_GATEWAY_TOKEN is not set. Deposit charges cannot be created or verified without it. \
                 Please set it to your payment gateway access token."
            );
            String::default()
        });
        Self { base_url, access_token: Secret::new(access_token) }
    }
}
