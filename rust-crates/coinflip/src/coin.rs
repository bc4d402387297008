//! Presentational coin. It only reacts to the `is_flipping` / `result`
//! signals handed down by the flip controller.

use crate::record::Side;

/// Frames in one full rotation of the spinning coin.
pub const FRAMES_PER_CYCLE: usize = 8;

/// What the coin currently shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoinView {
    /// Mid-rotation; `frame` is in `0..FRAMES_PER_CYCLE`.
    Spinning { frame: usize },
    /// Resting on a face. `settled` marks a freshly revealed result.
    Face { side: Side, settled: bool },
}

/// Emitted once per completed rotation while flipping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleCompleted;

#[derive(Clone, Debug, Default)]
pub struct CoinDisplay {
    frame: usize,
}

impl CoinDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self, is_flipping: bool, result: Option<Side>) -> CoinView {
        if is_flipping {
            return CoinView::Spinning { frame: self.frame };
        }
        match result {
            Some(side) => CoinView::Face {
                side,
                settled: true,
            },
            // neutral face is heads up
            None => CoinView::Face {
                side: Side::Heads,
                settled: false,
            },
        }
    }

    /// Advances the animation one frame. Returns a completion signal when a
    /// rotation finishes; the reveal itself is timed by the controller.
    pub fn tick(&mut self, is_flipping: bool) -> Option<CycleCompleted> {
        if !is_flipping {
            self.frame = 0;
            return None;
        }
        self.frame = (self.frame + 1) % FRAMES_PER_CYCLE;
        (self.frame == 0).then_some(CycleCompleted)
    }
}
