//! Cosmetic floating note glyphs and pointer marker state.

use rand::Rng;

pub const GLYPH_COUNT: usize = 20;
pub const GLYPH_SYMBOLS: [char; 3] = ['♪', '♫', '♬'];

#[derive(Debug, Clone, PartialEq)]
pub struct NoteGlyph {
    pub symbol: char,
    /// Horizontal offset in percent of the width, 0-100
    pub left: f32,
    pub opacity: f32,
    /// Seconds per float cycle
    pub duration: f32,
    /// Seconds before the first cycle starts
    pub delay: f32,
}

impl NoteGlyph {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            symbol: GLYPH_SYMBOLS[rng.gen_range(0..GLYPH_SYMBOLS.len())],
            left: rng.gen_range(0.0..100.0),
            opacity: rng.gen_range(0.3..0.8),
            duration: rng.gen_range(3.0..7.0),
            delay: rng.gen_range(0.0..2.0),
        }
    }

    /// Cycle progress in [0, 1) at `elapsed` seconds, or `None` before the delay.
    pub fn progress(&self, elapsed: f32) -> Option<f32> {
        if elapsed < self.delay {
            return None;
        }
        Some(((elapsed - self.delay) / self.duration).fract())
    }
}

/// Generate the fixed decorative set.
pub fn generate_glyphs<R: Rng + ?Sized>(rng: &mut R) -> Vec<NoteGlyph> {
    (0..GLYPH_COUNT).map(|_| NoteGlyph::random(rng)).collect()
}

/// Last known pointer position for the following marker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerTracker {
    pub x: f32,
    pub y: f32,
}

impl PointerTracker {
    pub fn update(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_fixed_count_in_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let glyphs = generate_glyphs(&mut rng);
        assert_eq!(glyphs.len(), GLYPH_COUNT);
        for g in &glyphs {
            assert!(GLYPH_SYMBOLS.contains(&g.symbol));
            assert!((0.0..100.0).contains(&g.left));
            assert!((0.3..0.8).contains(&g.opacity));
            assert!((3.0..7.0).contains(&g.duration));
            assert!((0.0..2.0).contains(&g.delay));
        }
    }

    #[test]
    fn test_progress_cycles() {
        let g = NoteGlyph {
            symbol: '♪',
            left: 50.0,
            opacity: 0.5,
            duration: 4.0,
            delay: 1.0,
        };
        assert_eq!(g.progress(0.5), None);
        assert_eq!(g.progress(3.0), Some(0.5));
        assert_eq!(g.progress(5.0), Some(0.0));
    }

    #[test]
    fn test_pointer_tracker() {
        let mut p = PointerTracker::default();
        p.update(10.0, 20.0);
        assert_eq!((p.x, p.y), (10.0, 20.0));
    }
}
