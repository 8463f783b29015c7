//! Application layer of the server.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `edgeshare-core`) and the infrastructure (OS input,
//! sockets, files).
//!
//! Code in this layer:
//!
//! - **Orchestrates** domain objects to fulfil a goal (e.g., "move the input
//!   to the next screen when the cursor crosses an edge").
//! - **Depends on abstractions** (traits such as `MessageSink` and
//!   `ScreenPort`) rather than concrete implementations, so it can be tested
//!   without a network or a desktop.
//! - **Performs no I/O itself**.  Bytes arrive as events and leave through
//!   sinks.
//!
//! # Sub-modules
//!
//! - **`events`** – The event payload the reactor carries and the
//!   `Scheduler` alias used throughout the server.
//!
//! - **`session`** – One `ClientSession` per TCP connection: handshake phase,
//!   frame reader, heartbeat and outbound sink.
//!
//! - **`switch_controller`** – Decides when the cursor leaves one screen for
//!   another: jump zones, corners, lock, modifiers, double-tap and delay.
//!   This is the code that runs on every mouse movement.
//!
//! - **`server_core`** – The state every handler works on.  Runs the
//!   handshake, relays input, shares clipboards and closes dead sessions.
//!
//! - **`update_layout`** – Validates the configuration and builds the
//!   topology and settings from it.

pub mod events;
pub mod server_core;
pub mod session;
pub mod switch_controller;
pub mod update_layout;
