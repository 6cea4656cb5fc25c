pub mod dedup;
pub mod dispatcher;
pub mod key;

pub use dedup::DedupWindow;
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use key::{NotificationKey, NotificationKind};
