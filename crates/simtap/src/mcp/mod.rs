pub mod server;
pub mod tools;

pub use server::{AutomationToolServer, Tool, ToolRequest, ToolResponse, ToolSchema};
