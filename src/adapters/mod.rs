//! Adapters: concrete implementations of the engine's port traits.
//!
//! | Adapter        | Implements      | Connects to                   |
//! |----------------|-----------------|-------------------------------|
//! | `tcp`          | Transport       | TCP board bridge, 1-byte frames |
//! | `memory_store` | SnapshotStore   | In-process postcard blobs     |
//! | `log_sink`     | EventSink       | `log` facade                  |

pub mod log_sink;
pub mod memory_store;
pub mod tcp;

pub use log_sink::LogEventSink;
pub use memory_store::MemorySnapshotStore;
pub use tcp::TcpTransport;
