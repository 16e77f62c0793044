pub mod config;
pub mod credentials;
pub mod errors;
pub mod git_ops;
pub mod notifier;
pub mod session;
pub mod setup;
pub mod watcher;
