//! Block vector processors - stateless per-sample transforms
//!
//! Every operation runs `LANES` samples at a time with `wide::f32x8` and
//! finishes the remainder with the scalar formula, so any buffer length is
//! processed completely. Vector and scalar paths use the same IEEE
//! operations in the same order and produce identical output.

use serde::{Deserialize, Serialize};
use wide::f32x8;

/// Lane width of the bulk path
pub const LANES: usize = 8;

/// Apply a lane operation over the bulk of `buffer` and a scalar one to the tail
#[inline]
fn map_lanes(buffer: &mut [f32], vector: impl Fn(f32x8) -> f32x8, scalar: impl Fn(f32) -> f32) {
    let mut chunks = buffer.chunks_exact_mut(LANES);
    for chunk in &mut chunks {
        let mut lanes = [0.0; LANES];
        lanes.copy_from_slice(chunk);
        chunk.copy_from_slice(&vector(f32x8::from(lanes)).to_array());
    }
    for sample in chunks.into_remainder() {
        *sample = scalar(*sample);
    }
}

/// Soft clip of a single sample: `clamp(x·drive / (1 + |x·drive|), -1, 1)`
///
/// A cheap tanh-like saturation.
#[inline]
pub fn soft_clip_sample(x: f32, drive: f32) -> f32 {
    let x = x * drive;
    (x / (1.0 + x.abs())).clamp(-1.0, 1.0)
}

/// Hard clip of a single sample to `[-threshold, threshold]`
///
/// `threshold` must be non-negative.
#[inline]
pub fn hard_clip_sample(x: f32, threshold: f32) -> f32 {
    x.max(-threshold).min(threshold)
}

/// Multiply every sample by `gain` in place
pub fn apply_gain(buffer: &mut [f32], gain: f32) {
    let gain_vec = f32x8::splat(gain);
    map_lanes(buffer, |v| v * gain_vec, |x| x * gain);
}

/// Saturate every sample in place (see [`soft_clip_sample`])
pub fn soft_clip(buffer: &mut [f32], drive: f32) {
    let drive_vec = f32x8::splat(drive);
    let one = f32x8::splat(1.0);
    let neg_one = f32x8::splat(-1.0);
    map_lanes(
        buffer,
        |v| {
            let x = v * drive_vec;
            (x / (one + x.abs())).max(neg_one).min(one)
        },
        |x| soft_clip_sample(x, drive),
    );
}

/// Clip every sample in place to `[-threshold, threshold]`
pub fn hard_clip(buffer: &mut [f32], threshold: f32) {
    let pos = f32x8::splat(threshold);
    let neg = f32x8::splat(-threshold);
    map_lanes(buffer, |v| v.max(neg).min(pos), |x| hard_clip_sample(x, threshold));
}

/// Write `a + b` into `dest`
///
/// Processes the common length of the three slices.
pub fn mix(dest: &mut [f32], a: &[f32], b: &[f32]) {
    let len = dest.len().min(a.len()).min(b.len());
    let mut dest_chunks = dest[..len].chunks_exact_mut(LANES);
    let a_chunks = a[..len].chunks_exact(LANES);
    let b_chunks = b[..len].chunks_exact(LANES);
    let (a_tail, b_tail) = (a_chunks.remainder(), b_chunks.remainder());

    for ((d, x), y) in (&mut dest_chunks).zip(a_chunks).zip(b_chunks) {
        let mut lanes_a = [0.0; LANES];
        let mut lanes_b = [0.0; LANES];
        lanes_a.copy_from_slice(x);
        lanes_b.copy_from_slice(y);
        d.copy_from_slice(&(f32x8::from(lanes_a) + f32x8::from(lanes_b)).to_array());
    }

    for ((d, &x), &y) in dest_chunks.into_remainder().iter_mut().zip(a_tail).zip(b_tail) {
        *d = x + y;
    }
}

/// Optional waveshaper at the end of the engine chain
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputStage {
    /// Output passes unchanged
    #[default]
    None,
    /// Tanh-like saturation with input drive
    SoftClip { drive: f32 },
    /// Brick-wall clip at +/- threshold
    HardClip { threshold: f32 },
}

impl OutputStage {
    /// Apply the stage in place
    #[inline]
    pub fn process(&self, buffer: &mut [f32]) {
        match *self {
            OutputStage::None => {}
            OutputStage::SoftClip { drive } => soft_clip(buffer, drive),
            OutputStage::HardClip { threshold } => hard_clip(buffer, threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.37).sin() * 3.0).collect()
    }

    #[test]
    fn test_unity_gain_is_noop() {
        let input = ramp(1027);
        let mut buffer = input.clone();
        apply_gain(&mut buffer, 1.0);
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_gain_matches_scalar_for_all_tail_lengths() {
        for len in 0..=3 * LANES + 5 {
            let input = ramp(len);
            let mut buffer = input.clone();
            apply_gain(&mut buffer, 0.3);
            let expected: Vec<f32> = input.iter().map(|x| x * 0.3).collect();
            assert_eq!(buffer, expected, "len {}", len);
        }
    }

    #[test]
    fn test_soft_clip_matches_scalar_for_all_tail_lengths() {
        for len in 0..=3 * LANES + 5 {
            let input = ramp(len);
            let mut buffer = input.clone();
            soft_clip(&mut buffer, 2.5);
            for (i, (&actual, &x)) in buffer.iter().zip(&input).enumerate() {
                let expected = soft_clip_sample(x, 2.5);
                assert!(
                    (actual - expected).abs() <= 1e-6,
                    "len {} sample {}: {} vs {}",
                    len, i, actual, expected
                );
            }
        }
    }

    #[test]
    fn test_soft_clip_is_bounded_and_odd() {
        let mut buffer: Vec<f32> = vec![-100.0, -1.0, -0.1, 0.0, 0.1, 1.0, 100.0, 1e6, -1e6];
        soft_clip(&mut buffer, 1.0);
        assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert_eq!(buffer[3], 0.0);
        assert_eq!(buffer[2], -buffer[4]);
        assert_eq!(buffer[1], -0.5);
    }

    #[test]
    fn test_hard_clip_idempotent() {
        let mut once = ramp(333);
        hard_clip(&mut once, 0.8);
        let mut twice = once.clone();
        hard_clip(&mut twice, 0.8);

        assert_eq!(once, twice);
        assert!(once.iter().all(|s| s.abs() <= 0.8));
    }

    #[test]
    fn test_hard_clip_matches_scalar_for_all_tail_lengths() {
        for len in 0..=3 * LANES + 5 {
            let input = ramp(len);
            let mut buffer = input.clone();
            hard_clip(&mut buffer, 1.5);
            let expected: Vec<f32> = input.iter().map(|&x| hard_clip_sample(x, 1.5)).collect();
            assert_eq!(buffer, expected, "len {}", len);
        }
    }

    #[test]
    fn test_mix_sums_including_tail() {
        let a = ramp(21);
        let b: Vec<f32> = (0..21).map(|i| i as f32).collect();
        let mut dest = vec![0.0; 21];
        mix(&mut dest, &a, &b);
        for i in 0..21 {
            assert_eq!(dest[i], a[i] + b[i]);
        }
    }

    #[test]
    fn test_mix_uses_common_length() {
        let mut dest = vec![-1.0; 12];
        mix(&mut dest, &[1.0; 10], &[2.0; 9]);
        assert!(dest[..9].iter().all(|&s| s == 3.0));
        assert!(dest[9..].iter().all(|&s| s == -1.0));
    }

    #[test]
    fn test_output_stage_dispatch() {
        let input = ramp(19);

        let mut buffer = input.clone();
        OutputStage::None.process(&mut buffer);
        assert_eq!(buffer, input);

        let mut buffer = input.clone();
        OutputStage::HardClip { threshold: 0.5 }.process(&mut buffer);
        let mut expected = input.clone();
        hard_clip(&mut expected, 0.5);
        assert_eq!(buffer, expected);

        let mut buffer = input.clone();
        OutputStage::SoftClip { drive: 3.0 }.process(&mut buffer);
        let mut expected = input;
        soft_clip(&mut expected, 3.0);
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_output_stage_yaml() {
        let stage: OutputStage = serde_yaml::from_str("type: hard_clip\nthreshold: 0.9\n").unwrap();
        assert_eq!(stage, OutputStage::HardClip { threshold: 0.9 });
        let stage: OutputStage = serde_yaml::from_str("type: none\n").unwrap();
        assert_eq!(stage, OutputStage::None);
    }
}
