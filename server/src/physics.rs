//! Ball and paddle motion for one room.
//!
//! Everything here is a pure function of the room's state and its
//! [`GameConfig`]; the room task decides when to call it.

use crate::config::GameConfig;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Ball centre and per-tick velocity in canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

/// A paddle's top edge and its owner's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub y: f64,
    pub score: u32,
}

impl Paddle {
    /// Vertically centred with a zero score.
    pub fn centered(config: &GameConfig) -> Self {
        Self {
            y: config.max_paddle_y() / 2.0,
            score: 0,
        }
    }

    pub fn set_y(&mut self, y: f64, config: &GameConfig) {
        self.y = clamp_paddle_y(y, config);
    }
}

/// Clamp a requested paddle position into `[0, canvas_height - paddle_height]`.
pub fn clamp_paddle_y(y: f64, config: &GameConfig) -> f64 {
    y.clamp(0.0, config.max_paddle_y())
}

/// Which end of the table a paddle guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn slot(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// Horizontal extent of this side's paddle.
    fn paddle_x_range(self, config: &GameConfig) -> (f64, f64) {
        match self {
            Side::Left => (0.0, config.paddle_width),
            Side::Right => (config.canvas_width - config.paddle_width, config.canvas_width),
        }
    }

    /// Whether a ball moving with `dx` is heading at this side.
    fn approached_by(self, dx: f64) -> bool {
        match self {
            Side::Left => dx < 0.0,
            Side::Right => dx > 0.0,
        }
    }
}

/// Source of serve directions.
///
/// Returns `(rightward, downward)`; each sign is chosen independently.
pub trait ServeDirection: Send {
    fn pick(&mut self) -> (bool, bool);
}

impl ServeDirection for ChaCha8Rng {
    fn pick(&mut self) -> (bool, bool) {
        (self.gen_bool(0.5), self.gen_bool(0.5))
    }
}

/// Place the ball at the centre with full speed on both axes.
pub fn serve(config: &GameConfig, direction: &mut dyn ServeDirection) -> Ball {
    let (rightward, downward) = direction.pick();
    let speed = config.ball_speed;
    Ball {
        x: config.canvas_width / 2.0,
        y: config.canvas_height / 2.0,
        dx: if rightward { speed } else { -speed },
        dy: if downward { speed } else { -speed },
    }
}

pub fn integrate(ball: &mut Ball) {
    ball.x += ball.dx;
    ball.y += ball.dy;
}

/// Reflect `dy` when the ball's edge has reached the top or bottom wall
/// while still moving into it. Returns true on a bounce.
pub fn bounce_walls(ball: &mut Ball, config: &GameConfig) -> bool {
    let r = config.ball_half_size;
    let hit_top = ball.y - r <= 0.0 && ball.dy < 0.0;
    let hit_bottom = ball.y + r >= config.canvas_height && ball.dy > 0.0;
    if hit_top || hit_bottom {
        ball.dy = -ball.dy;
        true
    } else {
        false
    }
}

/// Axis-aligned overlap between the ball and `side`'s paddle.
fn overlaps_paddle(ball: &Ball, paddle: &Paddle, side: Side, config: &GameConfig) -> bool {
    let r = config.ball_half_size;
    let (left, right) = side.paddle_x_range(config);
    ball.x - r <= right
        && ball.x + r >= left
        && ball.y + r >= paddle.y
        && ball.y - r <= paddle.y + config.paddle_height
}

/// Return the ball off `side`'s paddle if it is moving toward it and overlapping.
///
/// The return angle depends on where the paddle was struck: the centre gives
/// no change in `dy`, the edges add up to `deflection_gain / 2`.
pub fn collide_paddle(ball: &mut Ball, paddle: &Paddle, side: Side, config: &GameConfig) -> bool {
    if !side.approached_by(ball.dx) || !overlaps_paddle(ball, paddle, side, config) {
        return false;
    }
    let hit_fraction = ((ball.y - paddle.y) / config.paddle_height).clamp(0.0, 1.0);
    ball.dx = -ball.dx;
    ball.dy += (hit_fraction - 0.5) * config.deflection_gain;
    ball.dy = ball.dy.clamp(-config.max_ball_dy, config.max_ball_dy);
    true
}

/// The side whose player scores because the ball left the table, if any.
pub fn goal(ball: &Ball, config: &GameConfig) -> Option<Side> {
    if ball.x < 0.0 {
        Some(Side::Right)
    } else if ball.x > config.canvas_width {
        Some(Side::Left)
    } else {
        None
    }
}

/// Advance the ball one tick. Paddles are tested before goals; a ball a
/// paddle returns is never scored on the same tick, even past the line.
pub fn step(ball: &mut Ball, paddles: &[Paddle; 2], config: &GameConfig) -> Option<Side> {
    integrate(ball);
    bounce_walls(ball, config);
    for side in [Side::Left, Side::Right] {
        if collide_paddle(ball, &paddles[side.slot()], side, config) {
            return None;
        }
    }
    goal(ball, config)
}
