//! Agent orchestration
//!
//! The supervisor state machine, the generic worker tool loop, the handoff
//! primitive that moves control between them, and the typed event stream a
//! consumer can watch a turn through.

mod events;
mod handoff;
mod router;
mod worker;

pub use events::{has_balanced_markers, EventKind, TurnEvent};
pub use handoff::{
    finish_schema, handoff_schema, HandoffRecord, FINISH_SENTINEL, FINISH_TOOL, HANDOFF_PREFIX,
};
pub use router::{Supervisor, TurnRequest, ROUTER};
pub use worker::{Worker, WorkerOutcome};
