pub mod audit;
pub mod config;
pub mod create;
pub mod paths;
pub mod reconcile;
pub mod store;
pub mod util;
pub mod validator;
pub mod verify;
pub mod warn;
pub mod watcher;
