//! Real-time synchronization engine for a shared note canvas.
//!
//! Several users place text, checklist and image notes on a pannable,
//! zoomable canvas inside a room. This crate owns the local side of that
//! collaboration: an optimistic note cache that never waits on the network,
//! per-note debounced propagation of edits, pointer-gesture translation under
//! the canvas zoom, and the ephemeral presence/typing subsystem. Persistence
//! and fan-out are delegated to a remote channel behind the traits in
//! [`remote`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`room`] | [`room::RoomSession`], the controller that wires everything together |
//! | [`note`] | Note data model, content sum type and partial patches |
//! | [`store`] | Local note cache with id reconciliation and merge suppression |
//! | [`debounce`] | Per-note timers that coalesce edits into single remote writes |
//! | [`gesture`] | Camera transform and the drag/resize state machine |
//! | [`presence`] | Join/typing/leave tracking and display merge |
//! | [`identity`] | User profile cache with in-flight request coalescing |
//! | [`remote`] | Remote channel traits and the in-memory reference backend |
//! | [`upload`] | Blob upload boundary for image notes |
//! | [`notice`] | User-facing notifications (toasts) |
//! | [`config`] | Environment-driven tuning knobs |
//! | [`error`] | Error taxonomy and grepable error codes |
//! | [`consts`] | Shared numeric constants (size clamps, defaults) |

pub mod config;
pub mod consts;
pub mod debounce;
pub mod error;
pub mod gesture;
pub mod identity;
pub mod note;
pub mod notice;
pub mod presence;
pub mod remote;
pub mod room;
pub mod store;
pub mod upload;
