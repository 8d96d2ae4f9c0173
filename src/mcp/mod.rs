//! MCP stdio surface over the scan service.

mod server;

pub use server::AffectedPkgsServer;
