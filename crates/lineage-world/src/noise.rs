//! Value noise for terrain generation.
//!
//! Lattice values come from a permutation table shuffled by a seeded RNG, so
//! one seed always reproduces the same terrain. Samples lie in [0, 1).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Linear interpolation.
#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Seed-based lattice value noise.
pub struct ValueNoise {
    perm: [u8; 512],
    values: [f64; 256],
}

impl ValueNoise {
    /// Create a new generator from a seed.
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut rng);

        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&table);
        perm[256..].copy_from_slice(&table);

        let mut values = [0.0f64; 256];
        for v in values.iter_mut() {
            *v = rng.gen::<f64>();
        }
        Self { perm, values }
    }

    /// Raw lattice value at integer coordinates.
    #[inline]
    pub fn lattice(&self, x: i32, y: i32) -> f64 {
        let xi = (x & 255) as usize;
        let yi = (y & 255) as usize;
        self.values[self.perm[self.perm[xi] as usize + yi] as usize]
    }

    /// Bilinear interpolation between lattice points spaced `scale` apart.
    pub fn smooth(&self, x: f64, y: f64, scale: f64) -> f64 {
        let sx = x / scale;
        let sy = y / scale;
        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;
        let (xi, yi) = (x0 as i32, y0 as i32);

        let top = lerp(fx, self.lattice(xi, yi), self.lattice(xi + 1, yi));
        let bottom = lerp(fx, self.lattice(xi, yi + 1), self.lattice(xi + 1, yi + 1));
        lerp(fy, top, bottom)
    }
}

/// Multi-octave value noise, normalized by the amplitude sum.
pub struct FractalNoise {
    octaves: Vec<ValueNoise>,
    persistence: f64,
    scale: f64,
}

impl FractalNoise {
    /// Octave `i` is seeded with `seed + i * 1000` and sampled at half the
    /// previous octave's scale.
    pub fn new(seed: u64, num_octaves: usize, persistence: f64, scale: f64) -> Self {
        let octaves = (0..num_octaves)
            .map(|i| ValueNoise::new(seed.wrapping_add(i as u64 * 1000)))
            .collect();
        Self {
            octaves,
            persistence,
            scale,
        }
    }

    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut max_amplitude = 0.0;
        let mut scale = self.scale;

        for octave in &self.octaves {
            value += octave.smooth(x, y, scale) * amplitude;
            max_amplitude += amplitude;
            amplitude *= self.persistence;
            scale *= 0.5;
        }

        if max_amplitude > 0.0 {
            value / max_amplitude
        } else {
            0.0
        }
    }
}
