//! Query Executor: render a query, run it through the external tool once,
//! and decode the single-row JSON response into a typed document.

pub mod executor;
pub mod template;

pub use executor::{decode_payload, CommandRunner, Fetched, QueryExecutor, QueryRunner};
pub use template::{QueryParams, QueryTemplate};
