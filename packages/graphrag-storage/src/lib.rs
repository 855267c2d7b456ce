pub mod authority;
pub mod db;
pub mod graph;
pub mod keyword;
pub mod models;
pub mod profiles;
pub mod qdrant;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
