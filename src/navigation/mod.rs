//! Navigation layer
//!
//! Frame settlement tracking, dialog brokering, and the coordinator that
//! ties the navigate command to the events answering it.

pub mod coordinator;
pub mod dialogs;
pub mod frames;

pub use coordinator::{NavigationCoordinator, NavigationOptions, NavigationOutcome, ResponseStatus};
pub use dialogs::{spawn_dialog_broker, DialogAction, DialogBroker, DialogRule};
pub use frames::{spawn_frame_tracker, FrameSignals};
