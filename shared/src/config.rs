/// Playfield and match constants shared by server and client.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub paddle_width: f64,
    pub paddle_height: f64,
    /// Half of the ball's square bounding box
    pub ball_half_size: f64,
    /// Per-axis speed of a freshly served ball (canvas units per tick)
    pub ball_speed: f64,
    /// Extra vertical speed applied for an edge hit, scaled by hit offset
    pub deflection_gain: f64,
    /// Upper bound on |dy| after a paddle deflection
    pub max_ball_dy: f64,
    pub winning_score: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 400.0,
            paddle_width: 10.0,
            paddle_height: 100.0,
            ball_half_size: 10.0,
            ball_speed: 4.0,
            deflection_gain: 6.0,
            max_ball_dy: 10.0,
            winning_score: 5,
        }
    }
}

impl GameConfig {
    /// Highest legal paddle y (top edge).
    pub fn max_paddle_y(&self) -> f64 {
        self.canvas_height - self.paddle_height
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.canvas_width.is_finite() || self.canvas_width <= 0.0 {
            return Err("canvas_width must be finite and > 0".to_string());
        }
        if !self.canvas_height.is_finite() || self.canvas_height <= 0.0 {
            return Err("canvas_height must be finite and > 0".to_string());
        }
        if !self.paddle_height.is_finite()
            || self.paddle_height <= 0.0
            || self.paddle_height > self.canvas_height
        {
            return Err("paddle_height must be in (0, canvas_height]".to_string());
        }
        if !self.paddle_width.is_finite()
            || self.paddle_width <= 0.0
            || self.paddle_width * 2.0 >= self.canvas_width
        {
            return Err("paddle_width must be > 0 and leave room between paddles".to_string());
        }
        if !self.ball_half_size.is_finite()
            || self.ball_half_size <= 0.0
            || self.ball_half_size * 2.0 >= self.canvas_height
        {
            return Err("ball_half_size must be > 0 and fit inside the canvas".to_string());
        }
        if !self.ball_speed.is_finite() || self.ball_speed <= 0.0 {
            return Err("ball_speed must be finite and > 0".to_string());
        }
        if !self.deflection_gain.is_finite() || self.deflection_gain < 0.0 {
            return Err("deflection_gain must be finite and >= 0".to_string());
        }
        if !self.max_ball_dy.is_finite() || self.max_ball_dy < self.ball_speed {
            return Err("max_ball_dy must be finite and >= ball_speed".to_string());
        }
        if self.winning_score == 0 {
            return Err("winning_score must be > 0".to_string());
        }
        Ok(())
    }
}
