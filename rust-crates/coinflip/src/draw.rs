use crate::record::Side;
use rand::Rng;

/// Source of uniform draws in `[0, 1)`. A draw below one half counts as a
/// heads-like outcome.
pub trait CoinSource {
    fn draw(&mut self) -> f64;

    /// `true` keeps option 1 on heads.
    fn draw_assignment(&mut self) -> bool {
        self.draw() < 0.5
    }

    fn draw_side(&mut self) -> Side {
        if self.draw() < 0.5 {
            Side::Heads
        } else {
            Side::Tails
        }
    }
}

/// Draws from any `rand` generator; `RandCoin::default()` uses the thread rng.
pub struct RandCoin<R> {
    rng: R,
}

impl Default for RandCoin<rand::rngs::ThreadRng> {
    fn default() -> Self {
        Self { rng: rand::rng() }
    }
}

impl<R: Rng> RandCoin<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> CoinSource for RandCoin<R> {
    fn draw(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
#[derive(Clone, Debug)]
pub struct ScriptedCoin {
    draws: Vec<f64>,
    next: usize,
}

impl ScriptedCoin {
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        let draws = draws.into();
        assert!(!draws.is_empty(), "scripted coin needs at least one draw");
        Self { draws, next: 0 }
    }
}

impl CoinSource for ScriptedCoin {
    fn draw(&mut self) -> f64 {
        let value = self.draws[self.next % self.draws.len()];
        self.next += 1;
        value
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    #[test]
    fn scripted__maps_draws_to_assignment_then_side() {
        let mut coin = ScriptedCoin::new([0.3, 0.7]);

        assert!(coin.draw_assignment());
        assert_eq!(coin.draw_side(), Side::Tails);
    }

    #[test]
    fn rand_coin__draws_stay_in_unit_interval() {
        let mut coin = RandCoin::new(StdRng::seed_from_u64(7));

        for _ in 0..1_000 {
            let value = coin.draw();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn rand_coin__is_roughly_fair() {
        let mut coin = RandCoin::new(StdRng::seed_from_u64(42));
        let trials = 10_000;

        let heads = (0..trials)
            .filter(|_| coin.draw_side() == Side::Heads)
            .count();

        let fraction = heads as f64 / trials as f64;
        assert!((fraction - 0.5).abs() < 0.05, "heads fraction {fraction}");
    }
}
