use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::Duration;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    gateway::{GatewayHandle, HttpGateway},
    ledger::{LedgerHandle, MemoryLedger, MongoLedger},
};

/// How a vote submission finds the voter record it is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterIdentity {
    /// Every submission creates a fresh voter row.
    AlwaysCreate,
    /// Reuse a voter whose name and phone both match; reject a submission
    /// whose name or phone belongs to a different voter.
    ReuseByNameOrPhone,
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_vote_price")]
    pub(crate) vote_price: NonZeroU32,
    #[serde(default = "default_external_id_prefix")]
    pub(crate) external_id_prefix: String,
    #[serde(default = "default_voter_identity")]
    pub(crate) voter_identity: VoterIdentity,
    #[serde(default)]
    pub(crate) retain_failed_votes: bool,
    #[serde(default = "default_success_status")]
    pub(crate) success_status: String,
    #[serde(default)]
    pub(crate) sweep_interval: u32,
    #[serde(default = "default_sweep_stale_after")]
    pub(crate) sweep_stale_after: u32,
}

fn default_vote_price() -> NonZeroU32 {
    NonZeroU32::new(10).expect("10 is non-zero")
}

fn default_external_id_prefix() -> String {
    "TX".to_string()
}

fn default_voter_identity() -> VoterIdentity {
    VoterIdentity::AlwaysCreate
}

fn default_success_status() -> String {
    "COMPLETED".to_string()
}

fn default_sweep_stale_after() -> u32 {
    600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vote_price: default_vote_price(),
            external_id_prefix: default_external_id_prefix(),
            voter_identity: default_voter_identity(),
            retain_failed_votes: false,
            success_status: default_success_status(),
            sweep_interval: 0,
            sweep_stale_after: default_sweep_stale_after(),
        }
    }
}

impl Config {
    /// Amount paid for a single vote.
    pub fn vote_price(&self) -> u32 {
        self.vote_price.get()
    }

    /// Prefix of generated external transaction IDs.
    pub fn external_id_prefix(&self) -> &str {
        &self.external_id_prefix
    }

    pub fn voter_identity(&self) -> VoterIdentity {
        self.voter_identity
    }

    /// Keep rejected payments as `failed` votes instead of deleting them.
    pub fn retain_failed_votes(&self) -> bool {
        self.retain_failed_votes
    }

    /// The gateway's transaction status meaning the payment went through.
    /// Compared exactly.
    pub fn success_status(&self) -> &str {
        &self.success_status
    }

    /// Period of the pending sweep, or `None` if the sweep is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::seconds(self.sweep_interval.into()))
    }

    /// Age after which a pending vote is considered stale by the sweep.
    pub fn sweep_stale_after(&self) -> Duration {
        Duration::seconds(self.sweep_stale_after.into())
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which ledger implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LedgerKind {
    Mongodb,
    Memory,
}

/// Configuration for the ledger.
#[derive(Deserialize)]
struct LedgerConfig {
    ledger: LedgerKind,
    // secrets
    #[serde(default)]
    db_uri: Option<String>,
}

/// A fairing that loads the ledger config, connects to the database if
/// needed, and places a [`LedgerHandle`] into managed state.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<LedgerConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load ledger config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let ledger: LedgerHandle = match config.ledger {
            LedgerKind::Memory => {
                warn!("Using the in-memory ledger, votes will not survive a restart");
                Arc::new(MemoryLedger::new())
            }
            LedgerKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when `ledger = \"mongodb\"`");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                match MongoLedger::connect(&db_uri, DATABASE).await {
                    Ok(ledger) => Arc::new(ledger),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };
        info!("...ledger online!");

        rocket = rocket.manage(ledger);
        Ok(rocket)
    }
}

/// Name of the production database.
const DATABASE: &str = "paidvote";

/// Configuration for the payment gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    // non-secrets
    pub(crate) gateway_url: String,
    #[serde(default)]
    pub(crate) gateway_status_url: Option<String>,
    pub(crate) merchant_id: String,
    #[serde(default = "default_currency")]
    pub(crate) currency: String,
    #[serde(default = "default_money_service_provider")]
    pub(crate) money_service_provider: String,
    pub(crate) callback_url: String,
    #[serde(default = "default_gateway_timeout")]
    pub(crate) gateway_timeout: u32,
    // secrets
    pub(crate) gateway_token: String,
}

fn default_currency() -> String {
    "KES".to_string()
}

fn default_money_service_provider() -> String {
    "M-Pesa".to_string()
}

fn default_gateway_timeout() -> u32 {
    30
}

impl GatewayConfig {
    /// Upper bound on a single request to the gateway.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.gateway_timeout.into())
    }
}

/// A fairing that loads the gateway config and places a [`GatewayHandle`]
/// backed by [`HttpGateway`] into managed state.
pub struct GatewayFairing;

#[rocket::async_trait]
impl Fairing for GatewayFairing {
    fn info(&self) -> Info {
        Info {
            name: "Payment gateway",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<GatewayConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load payment gateway config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let gateway: GatewayHandle = match HttpGateway::new(config) {
            Ok(gateway) => Arc::new(gateway),
            Err(e) => {
                error!("Failed to construct payment gateway client: {e}");
                return Err(rocket);
            }
        };
        info!("Loaded payment gateway config");

        rocket = rocket.manage(gateway);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn defaults_apply_without_any_keys() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.vote_price(), 10);
        assert_eq!(config.external_id_prefix(), "TX");
        assert_eq!(config.voter_identity(), VoterIdentity::AlwaysCreate);
        assert!(!config.retain_failed_votes());
        assert_eq!(config.success_status(), "COMPLETED");
        assert!(config.sweep_interval().is_none());
        assert_eq!(config.sweep_stale_after(), Duration::seconds(600));
    }

    #[test]
    fn zero_vote_price_is_rejected() {
        let figment = Figment::new().merge(Serialized::default("vote_price", 0));
        assert!(figment.extract::<Config>().is_err());
    }

    #[test]
    fn voter_identity_parses_snake_case() {
        let figment = Figment::new()
            .merge(Serialized::default("voter_identity", "reuse_by_name_or_phone"))
            .merge(Serialized::default("sweep_interval", 60));
        let config = figment.extract::<Config>().unwrap();
        assert_eq!(config.voter_identity(), VoterIdentity::ReuseByNameOrPhone);
        assert_eq!(config.sweep_interval(), Some(Duration::seconds(60)));
    }
}
