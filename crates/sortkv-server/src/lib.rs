//! sortkv server
//!
//! RESP wire codec, command adapter and TCP server for the sortkv keyspace.

pub mod commands;
pub mod config;
pub mod protocol;
pub mod reply;
pub mod server;

pub use config::ServerConfig;
pub use reply::Reply;
pub use server::KvServer;
