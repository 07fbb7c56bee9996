use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use gemfall::core::{find_all_matches, Grid, LevelData};
use gemfall::engine::{Session, SessionConfig};
use gemfall::types::BoosterKind;

const BOARD: [&str; 8] = [
    "RGBYPORG", "RRBYPOBG", "BGRRYPOB", "YPOBGRRY", "RGBYPORG", "GGBYPOBB", "BYRRYPOO",
    "YPOBGRRY",
];

fn fresh_session(seed: u32) -> Session {
    let level = LevelData::new(8, 8, 30);
    let mut session = match Session::new(level, SessionConfig::default().with_seed(seed)) {
        Ok(session) => session,
        Err(e) => panic!("bench level rejected: {}", e),
    };
    session.resolve_initial();
    session
}

fn bench_find_all_matches(c: &mut Criterion) {
    let grid = Grid::from_ascii(&BOARD);

    c.bench_function("find_all_matches_8x8", |b| {
        b.iter(|| find_all_matches(black_box(&grid)))
    });
}

fn bench_initial_fill(c: &mut Criterion) {
    c.bench_function("session_new_8x8", |b| {
        let mut seed = 0u32;
        b.iter(|| {
            seed = seed.wrapping_add(1);
            fresh_session(black_box(seed))
        })
    });
}

fn bench_row_booster_turn(c: &mut Criterion) {
    let mut seed = 0u32;
    c.bench_function("row_booster_to_idle", |b| {
        b.iter_batched(
            || {
                seed = seed.wrapping_add(1);
                fresh_session(seed)
            },
            |mut session| {
                let _ = session.activate_booster(BoosterKind::Row);
                let report = session.apply_booster_at_cell(0, 4);
                session.tick();
                report
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_shuffle_turn(c: &mut Criterion) {
    c.bench_function("shuffle_to_idle", |b| {
        b.iter_batched(
            || fresh_session(42),
            |mut session| {
                let _ = session.activate_booster(BoosterKind::Shuffle);
                session.apply_booster_at_cell(0, 0)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_find_all_matches,
    bench_initial_fill,
    bench_row_booster_turn,
    bench_shuffle_turn
);
criterion_main!(benches);
