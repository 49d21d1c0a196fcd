//! Pseudo-3D road projection.
//!
//! Depth `y` runs from the horizon line down to the bottom of the canvas.
//! The road widens linearly with depth, and lane centres are spaced evenly
//! across the road width at that depth. The renderer and the engine share
//! these functions so hit-testing is the exact inverse of drawing.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CANVAS_WIDTH: f64 = 1000.0;
pub const CANVAS_HEIGHT: f64 = 600.0;
pub const HORIZON_Y: f64 = 200.0;
pub const ROAD_WIDTH_TOP: f64 = 100.0;
pub const ROAD_WIDTH_BOTTOM: f64 = 800.0;
pub const LANE_COUNT: usize = 5;

/// Fixed depth at which the player is drawn.
pub const PLAYER_Y: f64 = 500.0;

/// Lane index at the middle of the road.
pub const CENTER_LANE: usize = LANE_COUNT / 2;

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Road projection for a canvas of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Perspective {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub horizon_y: f64,
    pub road_width_top: f64,
    pub road_width_bottom: f64,
    pub lane_count: usize,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            horizon_y: HORIZON_Y,
            road_width_top: ROAD_WIDTH_TOP,
            road_width_bottom: ROAD_WIDTH_BOTTOM,
            lane_count: LANE_COUNT,
        }
    }
}

impl Perspective {
    /// Interpolation factor: 0.0 at the horizon, 1.0 at the canvas bottom.
    /// Not clamped; depths above the horizon give negative factors.
    pub fn depth_factor(&self, y: f64) -> f64 {
        (y - self.horizon_y) / (self.canvas_height - self.horizon_y)
    }

    /// Road width at depth `y`.
    pub fn road_width_at(&self, y: f64) -> f64 {
        self.road_width_top + (self.road_width_bottom - self.road_width_top) * self.depth_factor(y)
    }

    pub fn lane_width_at(&self, y: f64) -> f64 {
        self.road_width_at(y) / self.lane_count as f64
    }

    /// Screen x of a (possibly fractional) lane's centre at depth `y`.
    pub fn lane_x(&self, lane: f64, y: f64) -> f64 {
        let center = (self.lane_count / 2) as f64;
        self.canvas_width / 2.0 + (lane - center) * self.lane_width_at(y)
    }

    /// Lane under screen x at depth `y`, or `None` off the road.
    pub fn lane_at(&self, x: f64, y: f64) -> Option<usize> {
        let road_width = self.road_width_at(y);
        let road_start = (self.canvas_width - road_width) / 2.0;
        if x <= road_start || x >= road_start + road_width {
            return None;
        }
        let lane = ((x - road_start) / self.lane_width_at(y)).floor() as usize;
        Some(lane.min(self.lane_count - 1))
    }

    /// Hit-test a click at the player's depth.
    pub fn lane_at_player(&self, x: f64) -> Option<usize> {
        self.lane_at(x, PLAYER_Y)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
