//! Request building from conversation state

mod builder;

pub use builder::{build_request, parse_tool_schema};
