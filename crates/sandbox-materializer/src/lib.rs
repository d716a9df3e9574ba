//! Materializer (C3): projects a user's stored file tree into the live
//! container.
//!
//! The store is canonical; `/workspace` inside the container is only ever a
//! projection of it. Every write goes through the runtime's archive-extract
//! API rather than `docker cp` or in-container editors, so a single file
//! write is atomic from the container's point of view (see the workspace
//! `DESIGN.md` for why the archive API was chosen over shelling out to `cp`).

mod archive;
mod seed;

pub use seed::{push_file, seed};
