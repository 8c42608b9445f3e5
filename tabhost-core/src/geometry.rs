use serde::{Deserialize, Serialize};

use crate::registry::WindowId;

/// A screen-space point, in the host runtime's logical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle. For surfaces the origin is relative to the
/// owning window; for windows it is the window's screen position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A surface occupying this rectangle counts as hidden.
    ///
    /// Only the sum of the extents is checked, so a degenerate rect such as
    /// `0 x 0` at a non-zero origin is still hidden, while a minimized window
    /// reporting a real content size is not.
    pub fn is_collapsed(&self) -> bool {
        self.width + self.height == 0
    }

    /// Strict containment on every edge.
    pub fn contains_strict(&self, point: Point) -> bool {
        point.x > self.x
            && point.x < self.x + self.width
            && point.y > self.y
            && point.y < self.y + self.height
    }
}

/// Content area of a window: everything below the chrome strip, at the
/// window's full width.
pub fn content_rect(window_bounds: Rect, chrome_height: i32) -> Rect {
    Rect {
        x: 0,
        y: chrome_height,
        width: window_bounds.width,
        height: (window_bounds.height - chrome_height).max(0),
    }
}

/// Screen rectangle of a window's chrome strip, given the window's screen
/// position and the chrome surface's own bounds.
pub fn chrome_screen_rect(window_bounds: Rect, chrome_bounds: Rect) -> Rect {
    Rect {
        x: window_bounds.x,
        y: window_bounds.y,
        width: chrome_bounds.width,
        height: chrome_bounds.height,
    }
}

/// Pick the window whose chrome strip is under `cursor`.
///
/// Candidates are tested in the order given and the first hit wins. Every
/// edge is exclusive, matching the long-standing drop behaviour of the
/// shell; a cursor resting exactly on a chrome border is not a drop.
pub fn find_drop_target(cursor: Point, candidates: &[(WindowId, Rect)]) -> Option<WindowId> {
    candidates
        .iter()
        .find(|(_, rect)| rect.contains_strict(cursor))
        .map(|(id, _)| *id)
}
