//! State shared between a recognition run and whoever shows its result
//!
//! The workflow publishes progress through [`CaptureState`], parks the
//! result in the [`ResultHandoff`] and announces it with a one-shot
//! [`NavigationSignal`].

pub mod handoff;
pub mod messages;
pub mod state;

pub use handoff::{ResultHandoff, TransientResult};
pub use messages::{NavigationEvent, NavigationSignal, ResultRoute};
pub use state::CaptureState;
