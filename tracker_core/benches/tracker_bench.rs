use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sensor_models::DetectionResult;
use std::hint::black_box;
use tracker_core::{SensorTracker, TargetIndex, Track, TrackKey, TrackerHooks, TrackerSettings};

struct CopySnr;

impl TrackerHooks for CopySnr {
    fn update_track(&mut self, _sim_time: f64, track: &mut Track, result: &DetectionResult) {
        track.signal_to_noise = Some(result.signal_to_noise);
    }
}

fn bench_opportunities(c: &mut Criterion) {
    let mut group = c.benchmark_group("sensor_tracker");
    let settings = TrackerSettings {
        hits_to_establish: 3,
        establish_window: 5,
        hits_to_maintain: 2,
        maintain_window: 6,
        ..Default::default()
    };
    let result = DetectionResult::new(0.5);

    for n in [50u32, 500, 2000] {
        group.bench_function(format!("{n}_targets_20_frames"), |b| {
            b.iter(|| {
                let mut tracker = SensorTracker::new();
                let mut rng = ChaCha8Rng::seed_from_u64(42);
                let mut hooks = CopySnr;
                for frame in 0..20u32 {
                    for target in 0..n {
                        let key = TrackKey::search(TargetIndex(target));
                        let t = f64::from(frame);
                        // Every third target fades in and out
                        if target % 3 == 0 && frame % 4 == 3 {
                            tracker.target_undetected(t, &settings, key, &result, &mut hooks, &mut rng);
                        } else {
                            tracker.target_detected(t, &settings, key, &result, &mut hooks, &mut rng);
                        }
                    }
                }
                black_box(tracker.active_track_count());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_opportunities);
criterion_main!(benches);
