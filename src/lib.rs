pub mod aggregate;
pub mod config;
pub mod detect;
pub mod errors;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod sync;
