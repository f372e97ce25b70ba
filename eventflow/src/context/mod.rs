//! Run identity and the context passed to stages.

mod identity;
mod stage_context;

pub use identity::RunIdentity;
pub use stage_context::StageContext;
