//! PaintRoom Core Library
//!
//! State engine for the shared painting canvas: the local operation log with
//! undo/redo, presence of remote participants, the canvas version counter and
//! the gate deciding when local changes may be pushed to the relay.

pub mod clock;
pub mod collaboration;
pub mod color;
pub mod engine;
pub mod history;
pub mod operation;
pub mod presence;
pub mod protocol;
pub mod snapshot;
pub mod storage;
pub mod throttle;
pub mod tools;
pub mod version;

pub use clock::Timestamp;
pub use collaboration::CollaborationSession;
pub use color::{ColorParseError, PaintColor};
pub use engine::{CanvasEngine, CanvasObjects, CanvasState, EngineConfig};
pub use history::{DEFAULT_HISTORY_CAPACITY, History};
pub use operation::{Operation, OperationData, OperationId, OperationKind, SharedOperation, Stroke};
pub use presence::{ActiveUser, PresencePatch, PresenceTracker};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage, SyncEvent};
pub use snapshot::{RasterSnapshot, SnapshotBuffer};
pub use storage::{PreferenceStore, Storage, StorageError, StorageResult};
pub use throttle::{SyncThrottle, should_sync};
pub use tools::{BrushBounds, StrokeRecorder, ToolKind, ToolSettings};
pub use version::CanvasVersion;
