//! Rate-limited, retrying dispatch of synthesis requests.

pub mod cancel;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod throttle;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use dispatcher::{backoff_for, Dispatcher, DispatcherConfig};
pub use error::DispatchError;
pub use events::DispatchEvent;
pub use throttle::Throttle;
