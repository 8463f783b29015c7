//! Domain entities for edgeshare.
//!
//! This module contains pure rules with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core rules of the application.
//! - Has **no** imports from OS APIs, network libraries, or file systems.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here the domain is the map of screens and how the cursor crosses between
//! them, plus the bookkeeping that decides who owns each clipboard.

pub mod clipboard;
pub mod screen;

/// Screen topology: the core domain concept.
///
/// See [`topology::ScreenTopology`] for the main type.
pub mod topology;
