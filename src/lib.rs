pub mod record;
pub mod chunks;
pub mod embed;
pub mod binding;
pub mod colours;
pub mod creator;
pub mod embed_creator;
pub mod transport;
pub mod queue;
pub mod destination;
pub mod handler;
pub mod layer;

pub mod init;
pub mod env;

pub use handler::DiscordHandler;
pub use layer::DiscordLayer;
pub use record::{LogEvent, Severity};
