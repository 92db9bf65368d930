// Library for tests to access modules

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod models;
pub mod monitor;
pub mod prober;
pub mod routes;
pub mod sample_store;
pub mod scheduler;
pub mod targets;
