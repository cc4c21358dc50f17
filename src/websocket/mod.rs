//! WebSocket Real-Time Streaming
//!
//! Pushes every accepted telemetry batch to all connected viewers.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Registry of live subscribers and the fanout
//! - **Handler**: WebSocket upgrade and per-connection tasks
//! - **Messages**: Client and server message formats
//!
//! ## Usage
//!
//! Clients connect to `/ws`. No subscription step exists; every connection
//! receives every update from the moment it is acknowledged. Updates missed
//! while disconnected are not replayed; fetch them from `GET /api/telemetry`.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:5000/ws');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'telemetry_update') {
//!     console.log(msg.timestamp, msg.signals);
//!   }
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{
    BroadcastReport, ConnectionHub, Frame, HubConfig, HubError, SubscriberDeliveryError,
    SubscriberId, SubscriberState, Subscription,
};
pub use messages::{ClientMessage, ServerMessage};
