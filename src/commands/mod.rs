pub mod auth;
pub mod connection;
pub mod obs;
pub mod playback;
pub mod queue;
pub mod settings;

#[cfg(test)]
mod testing;

pub use auth::*;
pub use connection::*;
pub use obs::*;
pub use playback::*;
pub use queue::*;
pub use settings::*;
