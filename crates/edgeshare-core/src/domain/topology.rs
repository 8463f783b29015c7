//! Screen topology: named screens, their shapes, and their directed neighbor links.
//!
//! # How screens are connected (for beginners)
//!
//! There is no shared coordinate space.  Each screen has its own local
//! coordinates, and each of its four edges may name another screen.  When the
//! cursor runs off the right edge of `desk`, the topology looks up
//! `desk.right`, converts the cursor position into that screen's coordinates,
//! and reports where it lands.
//!
//! Links are one-way: `desk.right = laptop` does not imply
//! `laptop.left = desk`.  Cycles are allowed, so every walk through the graph
//! is bounded by the number of screens.
//!
//! Screens listed in the configuration but not currently connected are skipped
//! over: the cursor continues to whatever connected screen lies beyond them.

use std::collections::BTreeMap;

use thiserror::Error;

use super::screen::{Direction, ScreenShape};

/// Errors raised while building or updating a topology.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("screen already defined: {0}")]
    DuplicateScreen(String),

    #[error("unknown screen: {0}")]
    UnknownScreen(String),

    #[error("invalid shape for screen {name}: {width}x{height}, jump zone {jump_zone}")]
    InvalidShape {
        name: String,
        width: i32,
        height: i32,
        jump_zone: i32,
    },
}

/// One screen in the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    name: String,
    shape: ScreenShape,
    links: [Option<String>; 4],
    connected: bool,
}

impl Screen {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> ScreenShape {
        self.shape
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The configured link on `direction`, connected or not.
    pub fn link(&self, direction: Direction) -> Option<&str> {
        self.links[direction.index()].as_deref()
    }
}

/// Where a crossing lands: the destination screen and the entry point in its
/// local coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landing {
    pub screen: String,
    pub x: i32,
    pub y: i32,
}

/// The static map of screens and neighbor links.
#[derive(Debug, Clone, Default)]
pub struct ScreenTopology {
    screens: BTreeMap<String, Screen>,
}

impl ScreenTopology {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ──────────────────────────────────────────────────────────

    /// Adds a disconnected screen with no links.
    ///
    /// # Errors
    ///
    /// [`TopologyError::DuplicateScreen`] if the name is taken, and
    /// [`TopologyError::InvalidShape`] for a non-positive size or a negative
    /// jump zone.
    pub fn add_screen(&mut self, name: &str, shape: ScreenShape) -> Result<(), TopologyError> {
        if self.screens.contains_key(name) {
            return Err(TopologyError::DuplicateScreen(name.to_string()));
        }
        validate_shape(name, shape)?;
        self.screens.insert(
            name.to_string(),
            Screen {
                name: name.to_string(),
                shape,
                links: Default::default(),
                connected: false,
            },
        );
        Ok(())
    }

    /// Sets `from.direction = to`, replacing any previous link on that edge.
    pub fn link(&mut self, from: &str, direction: Direction, to: &str) -> Result<(), TopologyError> {
        if !self.screens.contains_key(to) {
            return Err(TopologyError::UnknownScreen(to.to_string()));
        }
        let screen = self.screen_mut(from)?;
        screen.links[direction.index()] = Some(to.to_string());
        Ok(())
    }

    pub fn set_connected(&mut self, name: &str, connected: bool) -> Result<(), TopologyError> {
        self.screen_mut(name)?.connected = connected;
        Ok(())
    }

    /// Replaces a screen's shape, e.g. after the screen reports a resolution change.
    pub fn set_shape(&mut self, name: &str, shape: ScreenShape) -> Result<(), TopologyError> {
        validate_shape(name, shape)?;
        self.screen_mut(name)?.shape = shape;
        Ok(())
    }

    fn screen_mut(&mut self, name: &str) -> Result<&mut Screen, TopologyError> {
        self.screens
            .get_mut(name)
            .ok_or_else(|| TopologyError::UnknownScreen(name.to_string()))
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn screen(&self, name: &str) -> Option<&Screen> {
        self.screens.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.screens.contains_key(name)
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.screens.get(name).is_some_and(|s| s.connected)
    }

    pub fn shape(&self, name: &str) -> Option<ScreenShape> {
        self.screens.get(name).map(|s| s.shape)
    }

    pub fn screens(&self) -> impl Iterator<Item = &Screen> {
        self.screens.values()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn connected_count(&self) -> usize {
        self.screens.values().filter(|s| s.connected).count()
    }

    /// The connected screen reached by leaving `name` through `direction`.
    ///
    /// Links to disconnected screens are followed through in the same
    /// direction until a connected screen or a dead end is found.
    pub fn neighbor(&self, name: &str, direction: Direction) -> Option<&str> {
        let mut next = self.screens.get(name)?.link(direction)?;
        for _ in 0..self.screens.len() {
            let screen = self.screens.get(next)?;
            if screen.connected {
                return Some(&screen.name);
            }
            next = screen.link(direction)?;
        }
        None
    }

    /// Resolves where a cursor at `(x, y)` on `name`, moving out through
    /// `direction`, lands.
    ///
    /// The coordinate along the direction of travel keeps its overshoot: if
    /// the cursor went further than the next screen is wide, the walk
    /// continues to the screen after it.  The perpendicular coordinate is
    /// rescaled at every hop with [`remap`](Self::remap).  The result is
    /// clamped into the destination and pushed out of its jump zone when the
    /// destination has a neighbor on the side the cursor enters from.
    pub fn neighbor_at(&self, name: &str, direction: Direction, x: i32, y: i32) -> Option<Landing> {
        let mut src = self.screens.get(name)?;
        let mut dst = self.screens.get(self.neighbor(name, direction)?)?;
        let (mut x, mut y) = (x, y);

        for _ in 0..self.connected_count().max(1) {
            (x, y) = remap_between(src.shape, direction, dst.shape, x, y);
            let inside = match direction {
                Direction::Right => {
                    x -= src.shape.width;
                    x < dst.shape.width
                }
                Direction::Left => {
                    x += dst.shape.width;
                    x >= 0
                }
                Direction::Bottom => {
                    y -= src.shape.height;
                    y < dst.shape.height
                }
                Direction::Top => {
                    y += dst.shape.height;
                    y >= 0
                }
            };
            if inside {
                break;
            }
            match self
                .neighbor(&dst.name, direction)
                .and_then(|n| self.screens.get(n))
            {
                Some(next) => {
                    src = dst;
                    dst = next;
                }
                None => break,
            }
        }

        let (x, y) = dst.shape.clamp(x, y);
        let (x, y) = avoid_jump_zone(dst, direction, x, y);
        Some(Landing {
            screen: dst.name.clone(),
            x,
            y,
        })
    }

    /// Rescales the coordinate perpendicular to `direction` from `src` to `dst`.
    ///
    /// For a left/right crossing `y' = round(y * (dstHeight - 1) / (srcHeight - 1))`
    /// clamped into the destination; top/bottom crossings rescale `x` the
    /// same way.  The other coordinate passes through unchanged.
    pub fn remap(&self, src: &str, direction: Direction, dst: &str, x: i32, y: i32) -> Option<(i32, i32)> {
        let src = self.screens.get(src)?;
        let dst = self.screens.get(dst)?;
        Some(remap_between(src.shape, direction, dst.shape, x, y))
    }
}

fn validate_shape(name: &str, shape: ScreenShape) -> Result<(), TopologyError> {
    if shape.width <= 0 || shape.height <= 0 || shape.jump_zone < 0 {
        return Err(TopologyError::InvalidShape {
            name: name.to_string(),
            width: shape.width,
            height: shape.height,
            jump_zone: shape.jump_zone,
        });
    }
    Ok(())
}

fn rescale(value: i32, src_len: i32, dst_len: i32) -> i32 {
    if src_len <= 1 {
        return 0;
    }
    let scaled = (f64::from(value) * f64::from(dst_len - 1) / f64::from(src_len - 1)).round() as i32;
    scaled.clamp(0, (dst_len - 1).max(0))
}

fn remap_between(src: ScreenShape, direction: Direction, dst: ScreenShape, x: i32, y: i32) -> (i32, i32) {
    if direction.is_horizontal() {
        (x, rescale(y, src.height, dst.height))
    } else {
        (rescale(x, src.width, dst.width), y)
    }
}

fn avoid_jump_zone(dst: &Screen, direction: Direction, x: i32, y: i32) -> (i32, i32) {
    let shape = dst.shape;
    let zone = shape.jump_zone;
    if zone <= 0 || dst.link(direction.opposite()).is_none() {
        return (x, y);
    }
    match direction {
        Direction::Right => (x.max(zone), y),
        Direction::Left => (x.min(shape.width - 1 - zone), y),
        Direction::Bottom => (x, y.max(zone)),
        Direction::Top => (x, y.min(shape.height - 1 - zone)),
    }
}
