pub mod config;
pub mod domain;
pub mod email_client;
pub mod ledger;
pub mod routes;
pub mod startup;
pub mod telemetry;
