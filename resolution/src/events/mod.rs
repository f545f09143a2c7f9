//! Observable run events.
//!
//! The controller publishes one event per stage entry and completion, plus a
//! start and finish event per run. Publishing never blocks and never fails
//! the run: a bus without subscribers simply drops events.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Controller  │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │ (log, trace) │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

mod bus;
mod types;

pub use bus::{EventBus, SharedEventBus};
pub use types::ResolutionEvent;
