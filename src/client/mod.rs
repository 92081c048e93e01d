pub mod chat;
pub mod playback;
pub mod queue;
pub mod state;

pub use chat::ChatLog;
pub use playback::{NowPlaying, PlaybackAction, PlaybackTracker, PlaybackView};
pub use queue::SongQueue;
pub use state::{AuthHealth, AuthService, ClientState, ConnectionState, MicState, Scene};
