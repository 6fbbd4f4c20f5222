//! Criterion benchmarks for UI action replay and emotion scoring.
//!
//! Run with:
//!   cargo bench --bench action_replay

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mimic::domain::models::{Action, Card, EmotionDelta, EmotionScores, UiState};
use mimic::services::UiExecutor;

fn catalogue(n: usize) -> UiState {
    let mut state = UiState::new();
    let cards = (0..n)
        .map(|i| Card {
            id: format!("car-{i}"),
            title: format!("Car {i}"),
        })
        .collect();
    state.sync_cards(cards, 3);
    state
}

fn session_actions(len: usize) -> Vec<Action> {
    let cycle = [
        Action::ClickCard { index: 1 },
        Action::FavoriteCard { index: 1 },
        Action::CloseDetail,
        Action::ToggleFilter { id: "awd".into() },
        Action::SetMileage { value: 60_000.0 },
        Action::Scroll,
        Action::ShowFavorites,
        Action::RefreshFilters,
        Action::Stare,
    ];
    cycle.iter().cycle().take(len).cloned().collect()
}

/// Replay action lists of increasing length against a 30-card catalogue.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("action_replay");
    let executor = UiExecutor::new(3);
    let initial = catalogue(30);

    for len in [10usize, 100, 1000] {
        let actions = session_actions(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &actions, |b, actions| {
            b.iter(|| executor.apply_all(black_box(&initial), black_box(actions)));
        });
    }
    group.finish();
}

fn bench_emotion_steps(c: &mut Criterion) {
    let deltas: Vec<EmotionDelta> = (0..30)
        .map(|i| EmotionDelta::new(f64::from(i % 5) * 0.1, f64::from(i % 3) * 0.15))
        .collect();
    c.bench_function("emotion_30_steps", |b| {
        b.iter(|| {
            deltas
                .iter()
                .fold(EmotionScores::default(), |s, d| s.step(*d, black_box(0.9), 3.0))
        });
    });
}

criterion_group!(benches, bench_replay, bench_emotion_steps);
criterion_main!(benches);
