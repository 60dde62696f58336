// Library for tests to access modules

pub mod alert;
pub mod baseline_repo;
pub mod clock;
pub mod commands;
pub mod config;
pub mod delta;
pub mod error;
pub mod health;
pub mod history_repo;
pub mod komari_repo;
pub mod logging;
pub mod models;
pub mod offset_repo;
pub mod period;
pub mod persist;
pub mod ranking;
pub mod render;
pub mod reports;
pub mod sample_repo;
pub mod telegram_repo;
pub mod version;
pub mod worker;
