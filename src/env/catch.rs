use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Action, Environment, State, StepResult};
use crate::error::{DqnError, Result};

pub const ROWS: usize = 8;
pub const COLS: usize = 5;

/// Catch: a ball falls from the top row, the paddle on the bottom row moves
/// left, stays, or moves right. One ball per episode, +1 for a catch, -1 for
/// a miss, zero reward while the ball is in flight.
///
/// The observation is the `ROWS x COLS` pixel grid flattened row-major, with
/// the ball and paddle pixels set to 1.0.
#[derive(Debug, Clone)]
pub struct CatchEnv {
    rng: StdRng,
    ball_row: usize,
    ball_col: usize,
    paddle_col: usize,
    done: bool,
}

impl CatchEnv {
    pub fn new(seed: u64) -> Self {
        CatchEnv {
            rng: StdRng::seed_from_u64(seed),
            ball_row: 0,
            ball_col: 0,
            paddle_col: COLS / 2,
            done: true,
        }
    }

    fn render(&self) -> State {
        let mut frame = Array1::zeros(ROWS * COLS);
        frame[self.ball_row * COLS + self.ball_col] = 1.0;
        frame[(ROWS - 1) * COLS + self.paddle_col] = 1.0;
        frame
    }
}

impl Environment for CatchEnv {
    fn reset(&mut self) -> Result<State> {
        self.ball_row = 0;
        self.ball_col = self.rng.gen_range(0..COLS);
        self.paddle_col = self.rng.gen_range(0..COLS);
        self.done = false;
        Ok(self.render())
    }

    fn step(&mut self, action: Action) -> Result<StepResult> {
        if self.done {
            return Err(DqnError::environment("step called before reset"));
        }
        self.paddle_col = match action {
            0 => self.paddle_col.saturating_sub(1),
            1 => self.paddle_col,
            2 => (self.paddle_col + 1).min(COLS - 1),
            _ => return Err(DqnError::InvalidAction { action, num_actions: 3 }),
        };
        self.ball_row += 1;

        let (reward, done) = if self.ball_row == ROWS - 1 {
            let reward = if self.ball_col == self.paddle_col { 1.0 } else { -1.0 };
            (reward, true)
        } else {
            (0.0, false)
        };
        self.done = done;

        Ok(StepResult { state: self.render(), reward, done })
    }

    fn num_actions(&self) -> usize {
        3
    }

    fn observation_size(&self) -> usize {
        ROWS * COLS
    }
}
