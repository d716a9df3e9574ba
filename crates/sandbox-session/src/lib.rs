//! Session manager (C4): mints opaque session ids, reuses one container per
//! user, and reaps containers nobody is tracking anymore.
//!
//! Session state lives in a [`dashmap::DashMap`] rather than the teacher's
//! single-threaded `Mutex<HashMap>`, since this service is reached
//! concurrently by many users' WebSocket and HTTP handlers at once (see
//! the workspace `SPEC_FULL.md` §5 note and `DESIGN.md`). The user-to-
//! container mapping is derived from it on demand rather than tracked
//! separately, since the managed-container labels are the source of truth
//! (spec.md §3).

mod session;

pub use session::{Session, SessionManager};
