//! Turns a parsed [`AppConfig`] into the validated objects the core runs on.
//!
//! [`build_topology`] creates one screen per `[[screens]]` entry and one link
//! per `left`/`right`/`top`/`bottom` key.  [`build_settings`] converts the
//! millisecond and name-based options into a [`ServerSettings`].
//!
//! # Validation (for beginners)
//!
//! Everything that can be wrong in a hand-written file is caught here, before
//! the server starts listening: duplicate screen names, links to screens that
//! do not exist, non-positive sizes, unknown modifier names, and a primary
//! screen that is missing from the list.  The core can then assume its
//! topology is consistent.

use std::collections::HashMap;
use std::time::Duration;

use edgeshare_core::protocol::modifiers;
use edgeshare_core::{CornerMask, Direction, ScreenShape, ScreenTopology, TopologyError};
use thiserror::Error;

use crate::application::server_core::ServerSettings;
use crate::application::switch_controller::{CornerSettings, SwitchPolicy};
use crate::infrastructure::storage::config::{AppConfig, ScreenEntry};

/// Error type for configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("unknown modifier name in switch_modifiers: {0}")]
    UnknownModifier(String),
    #[error("primary screen '{0}' is not listed in [[screens]]")]
    MissingPrimary(String),
}

/// Builds the screen graph described by `config`.
///
/// # Errors
///
/// [`LayoutError::Topology`] for duplicate names, invalid shapes or links to
/// unknown screens; [`LayoutError::MissingPrimary`] if `server.name` has no
/// screen entry.
pub fn build_topology(config: &AppConfig) -> Result<ScreenTopology, LayoutError> {
    let mut topology = ScreenTopology::new();
    for entry in &config.screens {
        let shape = ScreenShape::new(entry.width, entry.height, entry.jump_zone);
        topology.add_screen(&entry.name, shape)?;
    }
    // Links may point forward, so they are added after every screen exists.
    for entry in &config.screens {
        for (direction, neighbor) in links(entry) {
            topology.link(&entry.name, direction, neighbor)?;
        }
    }
    if !topology.contains(&config.server.name) {
        return Err(LayoutError::MissingPrimary(config.server.name.clone()));
    }
    Ok(topology)
}

fn links(entry: &ScreenEntry) -> impl Iterator<Item = (Direction, &str)> {
    [
        (Direction::Left, &entry.left),
        (Direction::Right, &entry.right),
        (Direction::Top, &entry.top),
        (Direction::Bottom, &entry.bottom),
    ]
    .into_iter()
    .filter_map(|(direction, link)| link.as_deref().map(|name| (direction, name)))
}

/// Builds the runtime settings from `config.options` and `config.server`.
///
/// # Errors
///
/// [`LayoutError::UnknownModifier`] for a modifier name that is not one of
/// `shift`, `control`, `alt`, `meta`, `super` or `altgr`.
pub fn build_settings(config: &AppConfig) -> Result<ServerSettings, LayoutError> {
    let opts = &config.options;

    let mut required_modifiers = 0u16;
    for name in &opts.switch_modifiers {
        let bit = modifiers::from_name(name).ok_or_else(|| LayoutError::UnknownModifier(name.clone()))?;
        required_modifiers |= bit;
    }

    let corners = CornerSettings {
        mask: opts.switch_corners.iter().copied().collect(),
        size: opts.switch_corner_size,
    };
    let screen_corners: HashMap<String, CornerSettings> = config
        .screens
        .iter()
        .filter(|s| s.switch_corners.is_some() || s.switch_corner_size.is_some())
        .map(|s| {
            let mask = s
                .switch_corners
                .as_ref()
                .map_or(corners.mask, |list| list.iter().copied().collect::<CornerMask>());
            let size = s.switch_corner_size.unwrap_or(corners.size);
            (s.name.clone(), CornerSettings { mask, size })
        })
        .collect();

    Ok(ServerSettings {
        policy: SwitchPolicy {
            delay: Duration::from_millis(opts.switch_delay_ms),
            two_tap: Duration::from_millis(opts.switch_double_tap_ms),
            required_modifiers,
            corners,
            screen_corners,
            relative_moves: opts.relative_mouse_moves,
        },
        heart_rate: Duration::from_millis(opts.heartbeat_ms),
        beats_until_death: opts.beats_until_death,
        handshake_timeout: Duration::from_millis(config.server.handshake_timeout_ms),
        screensaver_sync: opts.screensaver_sync,
    })
}
