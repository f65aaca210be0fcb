//! Staggered reveal timing for multiple-choice options

use rand::seq::SliceRandom;
use rand::Rng;

const INSTANT_REVEAL_CHANCE: f64 = 0.4;
const INSTANT_FIRST_WAVE_CHANCE: f64 = 0.3;

/// Reveal delays in seconds, index-aligned with the options.
///
/// Either every option appears at once, or options are dealt out over two
/// or three waves whose delays never decrease.
pub fn reveal_delays<R: Rng + ?Sized>(rng: &mut R, option_count: usize) -> Vec<f64> {
    if option_count == 0 || rng.random_bool(INSTANT_REVEAL_CHANCE) {
        return vec![0.0; option_count];
    }

    let wave_count = if rng.random_bool(0.5) { 2 } else { 3 };

    let mut waves = Vec::with_capacity(wave_count);
    waves.push(if rng.random_bool(INSTANT_FIRST_WAVE_CHANCE) {
        0.0
    } else {
        rng.random_range(2.0..3.0)
    });
    waves.push(rng.random_range(2.5..4.0));
    if wave_count == 3 {
        waves.push(rng.random_range(3.5..5.0));
    }
    waves.sort_by(f64::total_cmp);

    let mut slots: Vec<usize> = (0..option_count).collect();
    slots.shuffle(rng);

    let per_wave = option_count.div_ceil(wave_count);
    let mut delays = vec![0.0; option_count];
    for (position, slot) in slots.into_iter().enumerate() {
        let wave = (position / per_wave).min(wave_count - 1);
        delays[slot] = waves[wave];
    }

    delays
}
