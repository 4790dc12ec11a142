//! Database bootstrap and key-value helpers

pub mod init;
pub mod namespaces;
pub mod settings;

pub use init::*;
pub use namespaces::*;
pub use settings::*;
