pub mod cursor;
pub mod mock;
pub mod notify;
pub mod poll;
pub mod sync;

pub use cursor::{PollCursor, PollState};
pub use notify::{Notifier, SystemNotifier};
pub use poll::PollLoop;
pub use sync::{SyncEngine, SyncStats};
