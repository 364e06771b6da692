mod config;
mod manager;


pub use config::GovernanceConfig;
pub use manager::ConfigManager;
