//! Wire encodings and message shapes for the Connection Protocol and the
//! persisted record layout.

pub mod encoding;
pub mod headers;
pub mod messages;
pub mod persisted;
pub mod value;

pub use encoding::Encoding;
pub use messages::{ClientMessage, Error as ProtocolError, ServerMessage};
pub use persisted::{PersistedRecord, ScheduleEntry};
pub use value::WireValue;
