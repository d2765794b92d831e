//! # Resound Demo
//!
//! Drives a scripted session against the simulated device and logs what the
//! manager does: a looping theme with an intro, a crossfade into a second
//! track, a burst of effects that exhausts the pool, and a fade to silence.
//!
//! Usage: `resound-demo [config.toml]`. Set `RUST_LOG=resound=debug` to see
//! every slot transition.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use anyhow::Result;
use glam::Vec3;
use resound_engine::{Anchor, BgmRequest, ManagerConfig, SeRequest, SoundManager};
use resound_kernel::{ClipLibrary, SimulatedDevice};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Simulated frame length.
const FRAME: f32 = 1.0 / 60.0;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("resound=info".parse()?))
        .init();

    info!("Resound demo starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = std::env::args()
        .nth(1)
        .map_or_else(ManagerConfig::default, ManagerConfig::load_from);

    let device = Arc::new(SimulatedDevice::new());
    let mut manager = SoundManager::builder(device.clone())
        .se_catalog(
            ClipLibrary::new()
                .with_clip("footstep", 0.4)
                .with_clip("explosion", 2.5)
                .with_clip("engine", 1.2)
                .with_clip("coin", 0.3),
        )
        .bgm_catalog(
            ClipLibrary::new()
                .with_clip("field_intro", 4.0)
                .with_clip("field", 32.0)
                .with_clip("battle", 24.0),
        )
        .config(config)
        .build()?;

    let sender = manager.command_sender();
    let run = |manager: &mut SoundManager, seconds: f32| {
        let frames = (seconds / FRAME).round() as u32;
        for _ in 0..frames {
            device.advance(FRAME);
            manager.update(FRAME);
        }
    };

    info!("Field theme with intro");
    manager.play_bgm(
        BgmRequest::new("field")
            .with_intro("field_intro")
            .with_fade_in(2.0)
            .on_start(|| info!("Field theme audible")),
    );
    run(&mut manager, 5.0);

    info!("Car drives past the listener");
    let car = Anchor::new(Vec3::new(-40.0, 0.0, 5.0));
    manager.play_se(
        SeRequest::new("engine")
            .looping()
            .following(&car)
            .with_distances(2.0, 60.0),
    );
    for step in 0..80 {
        car.set(Vec3::new(-40.0 + step as f32, 0.0, 5.0));
        run(&mut manager, 0.05);
    }
    manager.stop_se_named("engine");

    info!("Battle: crossfade and an effect burst");
    manager.play_bgm(BgmRequest::new("battle").with_cross_fade(1.5, 0.5));
    for i in 0..12 {
        manager.play_se(
            SeRequest::new("explosion")
                .with_delay(0.1 * i as f32)
                .with_pitch(0.8 + 0.05 * i as f32),
        );
    }
    manager.play_se(SeRequest::new("coin").with_loop_count(3).on_complete(move || {
        sender.play_se(SeRequest::new("footstep").with_volume(0.6));
    }));
    run(&mut manager, 3.0);

    info!("Turning the effects down");
    manager.set_se_volume(0.25);
    run(&mut manager, 1.0);

    info!("Fading out");
    manager.fade_out_bgm(2.0);
    run(&mut manager, 2.5);

    info!(
        "Busy effect slots at end: {}",
        manager.effects().iter().filter(|p| !p.is_free()).count()
    );
    manager.shutdown();

    info!("Resound demo complete");
    Ok(())
}
