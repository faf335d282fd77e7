//! Realtime push: who is connected, and best-effort delivery to them.

pub mod dispatcher;
pub mod event;
pub mod registry;
pub mod session;

pub use dispatcher::NotificationDispatcher;
pub use event::{EventType, NotificationEvent};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, DeliveryError};
pub use session::{Connection, ConnectionGuard, SessionManager};
