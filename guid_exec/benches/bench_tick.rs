//! # Guidance Tick Benchmark

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::{eqpt::gnss::RawFix, tc::section::MasterMode};
use guid_lib::{
    coverage::CoverageMap,
    guid_core::{GuidCore, InputData},
    params::VehicleGeometryConfig,
};
use util::module::State;

const GEOMETRY: &str = r#"
[vehicle]
antenna_pivot_m = 1.5
hitch_length_m = -2.0

[tool]
section_boundaries_m = [-6.0, -4.5, -3.0, -1.5, 0.0, 1.5, 3.0, 4.5, 6.0]
look_ahead = 2.0
turn_off_delay_s = 1.0

[fix]
fix_rate_hz = 10
min_fix_step_dist_m = 0.5
"#;

/// Fixes around a 50 m radius circle, turning right at about 6 km/h.
fn track(num_fixes: i64) -> Vec<RawFix> {
    let t0 = Utc.timestamp_millis(1_600_000_000_000);
    let radius_m = 50.0;

    (0..num_fixes)
        .map(|k| {
            let heading = (k as f64 * 0.2) % 360.0;
            let a = heading.to_radians();
            RawFix::local(
                t0 + Duration::milliseconds(100 * k),
                radius_m * (1.0 - a.cos()),
                radius_m * a.sin(),
                Some(heading),
                Some(6.3),
            )
        })
        .collect()
}

fn tick_benchmark(c: &mut Criterion) {
    let config: VehicleGeometryConfig = util::params::from_str(GEOMETRY).unwrap();
    let fixes = track(600);

    c.bench_function("guid_core 600 ticks", |b| {
        b.iter(|| {
            let mut core = GuidCore::default();
            core.init(config.clone()).unwrap();
            core.open_job();
            core.set_master_mode(MasterMode::Manual);

            for fix in fixes.iter() {
                black_box(core.proc(&InputData::from_fix(fix.clone())).unwrap());
            }
        })
    });

    c.bench_function("guid_core + coverage map 600 ticks", |b| {
        b.iter(|| {
            let mut core = GuidCore::default();
            let mut map = CoverageMap::default();
            core.init(config.clone()).unwrap();
            core.open_job();
            core.set_master_mode(MasterMode::Auto);

            for fix in fixes.iter() {
                let input = InputData {
                    fix: fix.clone(),
                    demands: map.demands(core.polygons()),
                };
                let (view, _) = core.proc(&input).unwrap();
                map.update(&view.strips());
            }

            black_box(map.covered_area_m2())
        })
    });
}

criterion_group!(benches, tick_benchmark);
criterion_main!(benches);
