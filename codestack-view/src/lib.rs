pub mod input;
pub mod position;
pub mod search;
pub mod session;
pub mod state;

pub use input::{EventMapper, InputMode, KeyIntent};
pub use position::{Caret, GlyphMetrics, MonospaceMetrics, TableMetrics};
pub use search::{Direction, SearchMatch, SearchState};
pub use session::{ContextMenu, FrameView, Role, Target, ViewEvent, ViewSession};
pub use state::{FrameHeight, MemoryViewStorage, ViewStateRecord, ViewStateStore, ViewStorage};
