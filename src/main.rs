//! Spin Stop entry point
//!
//! The game core is a library driven by a web or native shell. Running the
//! binary natively plays one autopiloted round against in-memory storage.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use spin_stop::ads::{AdEvents, NoAds, RewardKind, RewardedController, RewardedSignal};
    use spin_stop::persistence::MemoryStore;
    use spin_stop::platform;
    use spin_stop::sim::GameStatus;
    use spin_stop::{AdConfig, Arcade, ModeId};

    platform::init_logging();
    log::info!("Spin Stop (native) starting...");

    let store = MemoryStore::new();
    let seed = platform::random_seed();
    let config = AdConfig::load(&store);
    let mut arcade = Arcade::new(store.clone(), seed);
    let mut rewarded = RewardedController::new(
        NoAds,
        AdEvents::new(),
        store,
        config.rewarded,
        RewardedSignal::new(),
    );
    rewarded.init(platform::now_ms());

    // Hit until the goal, then tap outside the zone
    let goal = 10 + (seed % 20) as u32;
    arcade.start_game(ModeId::Classic, &[]);
    let mut frame_ms = 0.0;
    while arcade.status() == GameStatus::Running && frame_ms < 600_000.0 {
        frame_ms += 1000.0 / 60.0;
        arcade.on_frame(frame_ms);

        let snapshot = arcade.snapshot();
        let in_zone = snapshot
            .zones
            .iter()
            .any(|zone| zone.contains_angle(snapshot.pointer_angle));
        if in_zone == (snapshot.score < goal) {
            arcade.on_input(frame_ms);
        }
    }

    if arcade.can_revive() {
        let handle = rewarded.show(RewardKind::Revive, platform::now_ms());
        match handle.result() {
            Some(result) if arcade.revive_with(&result) => log::info!("Revived"),
            _ => log::info!("No rewarded ad available, no revive"),
        }
    }

    let snapshot = arcade.snapshot();
    println!(
        "Round over: score {} (goal {}), coins {}, best {}",
        snapshot.score,
        goal,
        arcade.ledger().coins(),
        arcade.ledger().best_score(ModeId::Classic)
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The web shell drives the library directly
}
