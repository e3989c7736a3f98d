//! IPC server for dashboard communication

pub mod protocol;
pub mod server;

pub use protocol::{parse_command, serialize_response, Command, FilePayload, Response, PROTOCOL_VERSION};
pub use server::IpcServer;
