// Property tests for timing and dissolve math

use proptest::prelude::*;
use stillcut::engine::{OUTPUT_FPS, ShortImagePolicy, TimingPlan, crossfade_offsets};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Clips always add up to the audio length
    #[test]
    fn proptest_clips_cover_audio(audio in 0.1f64..3600.0, count in 1usize..200) {
        let plan = TimingPlan::new(audio, count, OUTPUT_FPS).unwrap();
        let total = plan.duration_per_image * count as f64;
        prop_assert!((total - audio).abs() < 1e-6);
        prop_assert!(plan.frame_count >= 1);
        let exact = plan.duration_per_image * OUTPUT_FPS as f64;
        prop_assert!((plan.frame_count as f64 - exact.max(1.0)).abs() <= 0.5 + 1e-9);
    }

    /// Dissolve offsets are evenly spaced, strictly increasing, and the last
    /// fade ends exactly when the last clip does
    #[test]
    fn proptest_crossfade_offsets(
        audio in 1.0f64..600.0,
        count in 2usize..60,
        nominal in 0.1f64..3.0,
    ) {
        let plan = TimingPlan::new(audio, count, OUTPUT_FPS).unwrap();
        let p = plan.duration_per_image;
        let d = ShortImagePolicy::Clamp.resolve(p, nominal).unwrap();
        prop_assert!(d > 0.0 && d < p);

        let offsets = crossfade_offsets(p, d, count);
        prop_assert_eq!(offsets.len(), count - 1);
        prop_assert!(offsets.windows(2).all(|w| w[1] > w[0]));
        prop_assert!((offsets[0] - (p - d)).abs() < 1e-9);

        let timeline = plan.timeline_duration(count, Some(d));
        let last_end = offsets[count - 2] + p;
        prop_assert!((timeline - last_end).abs() < 1e-6);
    }

    /// Reject never invents a dissolve the images can't hold
    #[test]
    fn proptest_reject_policy(p in 0.01f64..10.0, nominal in 0.01f64..10.0) {
        match ShortImagePolicy::Reject.resolve(p, nominal) {
            Some(d) => prop_assert!(d == nominal && p > nominal),
            None => prop_assert!(p <= nominal),
        }
    }
}
