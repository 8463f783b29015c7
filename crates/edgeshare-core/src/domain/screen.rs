//! Value types describing one screen: its shape, its edges, and its corners.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four edges a cursor can leave a screen through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Top,
        Direction::Bottom,
    ];

    /// The edge on the other side of the screen.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Top => Direction::Bottom,
            Direction::Bottom => Direction::Top,
        }
    }

    /// `true` for left/right crossings, where the y coordinate is rescaled.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Top => 2,
            Direction::Bottom => 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Top => "top",
            Direction::Bottom => "bottom",
        };
        f.write_str(name)
    }
}

/// Size of a screen and the width of its jump zone, in pixels.
///
/// Screen-local coordinates run from `(0, 0)` at the top-left corner to
/// `(width - 1, height - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenShape {
    pub width: i32,
    pub height: i32,
    /// Margin along each edge that triggers a candidate switch.
    pub jump_zone: i32,
}

impl ScreenShape {
    pub fn new(width: i32, height: i32, jump_zone: i32) -> Self {
        Self {
            width,
            height,
            jump_zone,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Clamps a point into the screen.
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.clamp(0, (self.width - 1).max(0)),
            y.clamp(0, (self.height - 1).max(0)),
        )
    }

    /// The screen center, where the cursor lands when no better position is known.
    pub fn center(&self) -> (i32, i32) {
        (self.width / 2, self.height / 2)
    }

    /// Returns the edge whose jump zone contains the point, if any.
    ///
    /// Points outside the screen count as inside the zone of the edge they
    /// crossed.  Left and right are checked before top and bottom.
    pub fn edge_at(&self, x: i32, y: i32) -> Option<Direction> {
        let zone = self.jump_zone.max(0);
        if x < zone {
            Some(Direction::Left)
        } else if x >= self.width - zone {
            Some(Direction::Right)
        } else if y < zone {
            Some(Direction::Top)
        } else if y >= self.height - zone {
            Some(Direction::Bottom)
        } else {
            None
        }
    }

    /// Returns the corner whose `size`-pixel square contains the point, if any.
    pub fn corner_at(&self, x: i32, y: i32, size: i32) -> Option<Corner> {
        if size <= 0 {
            return None;
        }
        let left = x < size;
        let right = x >= self.width - size;
        let top = y < size;
        let bottom = y >= self.height - size;
        match (left, right, top, bottom) {
            (true, _, true, _) => Some(Corner::TopLeft),
            (_, true, true, _) => Some(Corner::TopRight),
            (true, _, _, true) => Some(Corner::BottomLeft),
            (_, true, _, true) => Some(Corner::BottomRight),
            _ => None,
        }
    }
}

/// A screen corner.  Used to refuse switches that start in a "dead" corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Bit of this corner in a [`CornerMask`].
    pub fn bit(self) -> u8 {
        match self {
            Corner::TopLeft => 0x01,
            Corner::TopRight => 0x02,
            Corner::BottomLeft => 0x04,
            Corner::BottomRight => 0x08,
        }
    }
}

/// Set of corners, one bit per [`Corner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CornerMask(pub u8);

impl CornerMask {
    pub const NONE: CornerMask = CornerMask(0);

    pub fn contains(self, corner: Corner) -> bool {
        self.0 & corner.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Corner> for CornerMask {
    fn from_iter<I: IntoIterator<Item = Corner>>(iter: I) -> Self {
        CornerMask(iter.into_iter().fold(0, |mask, c| mask | c.bit()))
    }
}
