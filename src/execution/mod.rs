// Trade lifecycle: controller, session bookkeeping and the I/O runtime
pub mod controller;
pub mod history;
pub mod outbox;
pub mod requests;
pub mod runtime;
pub mod session;

pub use controller::{ControllerAction, TradeController, STAKE_RETRY_FACTOR};
pub use history::{TradeHistory, TradeStats, DEFAULT_HISTORY_CAPACITY};
pub use outbox::{Outbox, DEFAULT_OUTBOX_CAPACITY};
pub use requests::{PendingRequest, RequestTracker};
pub use runtime::Runtime;
pub use session::SessionState;
