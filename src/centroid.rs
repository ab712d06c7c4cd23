//! Host-side touch extraction from a 1-D intensity profile.
//!
//! Used for sensors without native centroid registers (craft, flex). The
//! profile is scanned left to right while accumulating an intensity-weighted
//! position. A touch boundary is declared when the profile has dropped far
//! enough below its running peak (a trough) and then starts rising again;
//! the accumulated segment becomes one centroid and the accumulators restart.
//!
//! This is a peak/trough segmentation heuristic, not a deconvolution: two
//! touches closer than the trough threshold merge into one, and the sample
//! that triggers a boundary is attributed to the segment it closes. Treat
//! the locations as approximate.
//!
//! Locations are in electrode-index units, 1-based: a touch centred on the
//! first electrode reports `1.0`.

use crate::core::types::Touch;

/// Upper bound on touches reported per profile
pub const MAX_TOUCHES: usize = 3;

/// Minimum drop below the running peak before a new touch can start
const TROUGH_THRESHOLD: i32 = 400;

/// Minimum sample-to-sample rise that starts a new touch after a trough
const RISE_THRESHOLD: i32 = 100;

/// Extract up to [`MAX_TOUCHES`] centroids from `samples`.
///
/// Each touch's `size` is the summed intensity of its segment.
pub fn extract(samples: &[u16]) -> Vec<Touch> {
    let mut touches = Vec::with_capacity(MAX_TOUCHES);
    let mut acc = Accumulator::default();

    for (j, &sample) in samples.iter().enumerate() {
        let value = i32::from(sample);
        acc.push(j, value);

        if j >= 2 {
            let rise = value - i32::from(samples[j - 1]);
            if acc.trough_depth > TROUGH_THRESHOLD && rise > RISE_THRESHOLD {
                touches.push(acc.centroid());
                acc = Accumulator::default();
                if touches.len() >= MAX_TOUCHES {
                    break;
                }
            }
        }
    }

    if touches.len() < MAX_TOUCHES && acc.unweighted != 0.0 {
        touches.push(acc.centroid());
    }

    touches
}

#[derive(Default)]
struct Accumulator {
    weighted: f32,
    unweighted: f32,
    peak: i32,
    trough_depth: i32,
}

impl Accumulator {
    #[inline]
    fn push(&mut self, index: usize, value: i32) {
        self.unweighted += value as f32;
        self.weighted += value as f32 * (index + 1) as f32;
        self.peak = self.peak.max(value);
        self.trough_depth = self.trough_depth.max(self.peak - value);
    }

    fn centroid(&self) -> Touch {
        Touch {
            location: self.weighted / self.unweighted,
            size: self.unweighted,
        }
    }
}
