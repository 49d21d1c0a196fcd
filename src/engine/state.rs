//! Lane-runner game state and the per-frame transition.
//!
//! `GameState::step` advances the world by exactly one animation frame.
//! It never awaits and never fails: randomness is injected so a seeded
//! RNG replays identically, and an empty asset pool simply skips spawning.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::geometry::{CANVAS_HEIGHT, CANVAS_WIDTH, CENTER_LANE, HORIZON_Y, LANE_COUNT, PLAYER_Y};
use crate::types::{Asset, GameError, GameSettings};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const PLAYER_SIZE: f64 = 15.0;
pub const STAR_COUNT: usize = 200;
pub const PLATFORM_LENGTH: f64 = 80.0;

/// Lanes travelled per frame while switching.
pub const LANE_SWITCH_STEP: f64 = 0.15;

/// Rides start for platforms strictly between `PLAYER_Y` and this depth.
pub const RIDE_ACTIVATION_Y: f64 = 510.0;
pub const PLATFORM_DESPAWN_Y: f64 = 600.0;

/// A new platform spawns once the newest one is this far past the horizon.
pub const SPAWN_GAP: f64 = 50.0;

pub const OPPORTUNITY_CHANCE: f64 = 0.6;
pub const MOMENTUM_MIN: f64 = 0.5;
pub const MOMENTUM_MAX: f64 = 2.0;

/// Frames for road speed to double.
pub const SPEED_RAMP_FRAMES: f64 = 30_000.0;

/// P&L per unit of momentum above 1.0.
pub const PNL_SCALE: f64 = 10_000.0;

/// News can never push momentum below this.
pub const MOMENTUM_FLOOR: f64 = 0.1;
pub const NEWS_LOG_LEN: usize = 5;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    /// Fractional while a lane switch is in progress.
    pub current_lane: f64,
    pub target_lane: f64,
    pub size: f64,
}

impl Player {
    fn centered() -> Self {
        Self {
            current_lane: CENTER_LANE as f64,
            target_lane: CENTER_LANE as f64,
            size: PLAYER_SIZE,
        }
    }

    /// Move one step toward the target lane, snapping when within a step.
    fn step_toward_target(&mut self) {
        let diff = self.target_lane - self.current_lane;
        if diff == 0.0 {
            return;
        }
        if diff.abs() <= LANE_SWITCH_STEP {
            self.current_lane = self.target_lane;
        } else {
            self.current_lane += diff.signum() * LANE_SWITCH_STEP;
        }
    }

    /// The whole lane the player currently occupies.
    pub fn lane(&self) -> usize {
        self.current_lane.round().max(0.0) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Platform {
    pub id: u64,
    /// Depth; grows by the game speed every frame.
    pub y: f64,
    pub length: f64,
    pub lane_index: usize,
    /// Long when true, short when false.
    pub is_opportunity: bool,
    pub asset: Asset,
    pub momentum: f64,
}

impl Platform {
    pub fn direction(&self) -> f64 {
        if self.is_opportunity {
            1.0
        } else {
            -1.0
        }
    }

    /// Ride P&L implied by the current momentum.
    pub fn pnl(&self) -> f64 {
        (self.momentum - 1.0) * PNL_SCALE * self.direction()
    }
}

/// An open position entered by driving onto a platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ride {
    pub platform: Platform,
    pub entry_score: f64,
    pub current_score: f64,
    pub pnl: f64,
}

/// Decorative background star.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Star {
    pub x: f64,
    pub y: f64,
    pub r: f64,
    pub vy: f64,
}

/// A generated headline and the momentum impact it carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub id: String,
    pub asset: Asset,
    pub headline: String,
    pub impact: f64,
    /// Frame counter when the item was applied.
    pub game_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameState {
    pub score: f64,
    pub player: Player,
    /// In spawn order, not depth order.
    pub platforms: Vec<Platform>,
    pub stars: Vec<Star>,
    pub current_ride: Option<Ride>,
    pub game_time: u64,
    pub game_speed: f64,
    pub news: Vec<NewsItem>,
    #[serde(skip)]
    next_platform_id: u64,
}

/// Ride lifecycle change produced by a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RideChange {
    Entered { symbol: &'static str, entry_score: f64 },
    StoppedOut { symbol: &'static str, loss: f64 },
}

impl GameState {
    /// Fresh state: player centred, empty road, random star field.
    pub fn new<R: Rng + ?Sized>(settings: &GameSettings, rng: &mut R) -> Self {
        let stars = (0..STAR_COUNT)
            .map(|_| Star {
                x: rng.gen::<f64>() * CANVAS_WIDTH,
                y: rng.gen::<f64>() * CANVAS_HEIGHT,
                r: rng.gen::<f64>() * 1.5,
                vy: 1.0 + rng.gen::<f64>() * 2.0,
            })
            .collect();

        Self {
            score: settings.starting_score,
            player: Player::centered(),
            platforms: Vec::new(),
            stars,
            current_ride: None,
            game_time: 0,
            game_speed: settings.road_speed,
            news: Vec::new(),
            next_platform_id: 0,
        }
    }

    /// Advance one frame in place.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        settings: &GameSettings,
        autopilot: bool,
        rng: &mut R,
    ) -> Option<RideChange> {
        self.game_time += 1;
        self.game_speed = settings.road_speed * (1.0 + self.game_time as f64 / SPEED_RAMP_FRAMES);

        self.player.step_toward_target();

        let speed = self.game_speed;
        for p in &mut self.platforms {
            p.y += speed;
        }
        self.platforms.retain(|p| p.y < PLATFORM_DESPAWN_Y);

        self.maybe_spawn(settings, rng);

        let change = match self.current_ride.take() {
            Some(ride) => self.resolve_ride(ride, settings.stop_pct),
            None => self.try_enter_ride(),
        };

        if autopilot && self.current_ride.is_none() {
            self.steer_autopilot(settings.min_momentum);
        }

        for s in &mut self.stars {
            s.y += s.vy * speed * 0.1;
            if s.y > CANVAS_HEIGHT {
                s.y = 0.0;
            }
        }

        change
    }

    fn maybe_spawn<R: Rng + ?Sized>(&mut self, settings: &GameSettings, rng: &mut R) {
        let due = self
            .platforms
            .last()
            .map_or(true, |p| p.y > HORIZON_Y + SPAWN_GAP);
        if !due {
            return;
        }

        let pool = settings.allowed_assets.resolve();
        if pool.is_empty() {
            return;
        }

        let platform = Platform {
            id: self.next_platform_id,
            y: HORIZON_Y,
            length: PLATFORM_LENGTH,
            lane_index: rng.gen_range(0..LANE_COUNT),
            is_opportunity: rng.gen::<f64>() < OPPORTUNITY_CHANCE,
            asset: pool[rng.gen_range(0..pool.len())],
            momentum: rng.gen_range(MOMENTUM_MIN..MOMENTUM_MAX),
        };
        self.next_platform_id += 1;
        self.platforms.push(platform);
    }

    fn resolve_ride(&mut self, mut ride: Ride, stop_pct: f64) -> Option<RideChange> {
        let pnl = ride.platform.pnl();
        let cap = ride.entry_score * stop_pct;

        if pnl < -cap {
            self.score = ride.entry_score - cap;
            debug!(
                symbol = ride.platform.asset.symbol,
                entry = ride.entry_score,
                loss = -cap,
                "Ride stopped out"
            );
            return Some(RideChange::StoppedOut {
                symbol: ride.platform.asset.symbol,
                loss: -cap,
            });
        }

        ride.pnl = pnl;
        ride.current_score = ride.entry_score + pnl;
        self.score = ride.current_score;
        self.current_ride = Some(ride);
        None
    }

    fn try_enter_ride(&mut self) -> Option<RideChange> {
        let lane = self.player.lane();
        let idx = self
            .platforms
            .iter()
            .position(|p| p.lane_index == lane && p.y > PLAYER_Y && p.y < RIDE_ACTIVATION_Y)?;

        let platform = self.platforms.remove(idx);
        let symbol = platform.asset.symbol;
        debug!(symbol, lane, entry = self.score, "Ride entered");

        self.current_ride = Some(Ride {
            platform,
            entry_score: self.score,
            current_score: self.score,
            pnl: 0.0,
        });
        Some(RideChange::Entered {
            symbol,
            entry_score: self.score,
        })
    }

    /// Steer toward the upcoming qualifying platform with the smallest depth.
    fn steer_autopilot(&mut self, min_momentum: f64) {
        let target = self
            .platforms
            .iter()
            .filter(|p| p.y > HORIZON_Y && p.y < PLAYER_Y && p.momentum >= min_momentum)
            .min_by(|a, b| a.y.total_cmp(&b.y));
        if let Some(p) = target {
            self.player.target_lane = p.lane_index as f64;
        }
    }

    // -- Player input ----------------------------------------------------

    /// Set the lane the player should move toward.
    pub fn set_target_lane(&mut self, lane: usize) -> Result<(), GameError> {
        if lane >= LANE_COUNT {
            return Err(GameError::InvalidLane {
                lane,
                lane_count: LANE_COUNT,
            });
        }
        self.player.target_lane = lane as f64;
        Ok(())
    }

    /// Close the active ride at its current P&L. Returns the realized P&L.
    pub fn exit_ride(&mut self) -> Option<f64> {
        let ride = self.current_ride.take()?;
        self.score = ride.current_score;
        Some(ride.pnl)
    }

    // -- News ------------------------------------------------------------

    /// Log a headline and push its impact into every matching platform,
    /// including the one held by an active ride.
    pub fn apply_news(&mut self, item: NewsItem) {
        let symbol = item.asset.symbol;
        let impact = item.impact;
        let nudge = |p: &mut Platform| {
            if p.asset.symbol == symbol {
                p.momentum = (p.momentum + impact).max(MOMENTUM_FLOOR);
            }
        };

        self.platforms.iter_mut().for_each(nudge);
        if let Some(ride) = self.current_ride.as_mut() {
            nudge(&mut ride.platform);
        }

        self.news.push(item);
        if self.news.len() > NEWS_LOG_LEN {
            let excess = self.news.len() - NEWS_LOG_LEN;
            self.news.drain(..excess);
        }
    }

    pub fn clear_news(&mut self) {
        self.news.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
