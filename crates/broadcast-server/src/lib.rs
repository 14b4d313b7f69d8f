pub mod bridge;
pub mod envelope;
pub mod server;

pub use bridge::*;
pub use envelope::*;
pub use server::*;
