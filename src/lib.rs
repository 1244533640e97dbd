#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod model;
mod scheduled_task;
pub mod service;
pub mod sweep;

pub use config::Config;
pub use gateway::{GatewayHandle, PaymentGateway};
pub use ledger::{Ledger, LedgerHandle};

use config::{ConfigFairing, GatewayFairing, LedgerFairing};
use logging::LoggerFairing;
use sweep::SweepFairing;

/// Build the server, connecting to the ledger and payment gateway described
/// by the figment configuration during ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(LedgerFairing)
        .attach(GatewayFairing)
        .attach(SweepFairing::default())
        .attach(LoggerFairing)
}

/// Build a server over an already-constructed ledger and gateway.
/// No pending sweep is scheduled.
pub fn rocket_for_ledger_and_gateway(ledger: LedgerHandle, gateway: GatewayHandle) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(ledger)
        .manage(gateway)
}
