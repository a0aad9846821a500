mod event;
mod handle;
mod log;
mod machine;
mod phase;

pub use event::Method;
pub use handle::ProgressHandle;
pub use machine::{Effect, Ticket};
pub use phase::Phase;
