pub mod instance;
pub mod message;
pub mod room;

pub use instance::{Instance, InstanceStatus, NewInstance};
pub use message::{messages_to_value, Message, MessageScope};
pub use room::{Moderation, Room, RoomConfig, RoutingMode};
