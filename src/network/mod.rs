pub mod api_client;
pub mod config;
pub mod dedup;
pub mod messages;
pub mod ws_client;

pub use api_client::{error_for_status, ApiClient};
pub use config::{api_config, set_api_config, ApiConfig};
pub use dedup::MessageDeduplicator;
pub use messages::{AgentThought, ChatMessage, WsMessage};
pub use ws_client::{with_live_channel, ConnectionState, LiveChannel, SubscriptionId, Subscribers};
