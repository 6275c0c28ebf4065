//! # Independent Stash Architecture
//!
//! A player stash that lives **outside** the host game's own save slots: one
//! large container, persisted to its own file, attached to the world as an
//! extra interaction on the player's storage every time the hub level loads.
//!
//! The crate is a library first. The host game is reached only through the
//! traits in [`host`]; everything else is plain Rust values and can be driven
//! from tests or the `stash` CLI without a game running.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Lifecycle (runtime.rs, events.rs)                          │
//! │  - Subscribes to host signals, ticks once per frame         │
//! │  - Delayed attach, save triggers, "store all" arming        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Stash Context (context.rs)                                 │
//! │  - Owns persistence and attachment together                 │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │  Persistence (persistence.rs) │ │  Attachment (attach.rs)   │
//! │  - Debounce, backup, migrate  │ │  - World object, grouping │
//! │  - Atomic keyed-file commits  │ │  - Deferred restore       │
//! └───────────────────────────────┘ └───────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │  Storage (store/)             │ │  Host adapter (host.rs)   │
//! │  - FsBackend, MemBackend      │ │  - SimHost for testing    │
//! └───────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! ## Data Model
//!
//! - [`model::Snapshot`]: capacity plus sparse `(slot, item)` entries. This is
//!   what gets persisted.
//! - [`container::LiveContainer`]: the mutable, slot-addressed container the
//!   host UI shows.
//!
//! ## Testing Approach
//!
//! - Unit tests live next to each module and run against [`store::MemBackend`],
//!   [`sim::SimHost`] and [`clock::ManualClock`].
//! - `tests/` covers end-to-end flows through the real filesystem and the CLI.

pub mod attach;
pub mod clock;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod events;
pub mod filters;
pub mod host;
pub mod model;
pub mod paths;
pub mod persistence;
pub mod restore;
pub mod runtime;
pub mod sim;
pub mod store;
