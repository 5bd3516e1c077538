pub mod anchoring;
pub mod canvas;
pub mod dom;
pub mod markup;
pub mod messages;
pub mod models;
pub mod panel;
pub mod session;
pub mod storage;
pub mod store;

// Re-export key types for easier usage
pub use anchoring::{StructuralPath, TextAnchorPoint, TextPosition};
pub use dom::{DocumentTree, DocumentTreeMut, Dom, NodeId, parse_markup};
pub use markup::{ApplyError, ReapplyReport};
pub use messages::{Mode, Request, Response};
pub use models::*;
pub use panel::{ControlPanel, PanelError};
pub use session::{Event, EventQueue, Notice, Selection, Session};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageError};
pub use store::{AnchorStore, StoreError};
