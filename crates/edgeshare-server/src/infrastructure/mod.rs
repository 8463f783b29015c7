//! Infrastructure layer: everything that talks to the OS.
//!
//! - **`input_capture`** – The seams to the local desktop: where captured
//!   input comes from and how the primary screen is entered and left.
//! - **`network`** – TCP listener and per-connection reader/writer tasks.
//! - **`storage`** – TOML configuration file.

pub mod input_capture;
pub mod network;
pub mod storage;
