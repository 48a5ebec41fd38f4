#[macro_use] extern crate failure;
#[macro_use] extern crate failure_derive;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
#[macro_use] extern crate serde_derive;

#[macro_use] mod macros;

pub mod approval;
pub mod audit;
pub mod authz;
pub mod checks;
pub mod config;
pub mod env;
pub mod files;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod posting;
pub mod render;
pub mod replaces;
pub mod store;
pub mod utils;
pub mod validate;

pub use self::config::Config;
pub use self::env::Env;

pub type Result<T, E=failure::Error> = std::result::Result<T, E>;
