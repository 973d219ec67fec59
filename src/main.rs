//! Example simulation demonstrating the lifetime foundations

use std::cell::Cell;
use std::rc::Rc;

use foundation::handle::trace;
use foundation::prelude::*;

/// Per-frame state for one simulated particle
struct Particle {
    position: f32,
    velocity: f32,
}

fn main() {
    env_logger::init();

    log::info!("starting lifetime demo");

    let particles: Pool<Particle> = Pool::with_capacity(8);
    let on_tick: Event<f64> = Event::new();

    // a frame counter wired through the tick channel
    let frames = Rc::new(Cell::new(0_u32));
    let frame_tally = Rc::clone(&frames);
    let _counter = on_tick.connect(move |_dt| frame_tally.set(frame_tally.get() + 1));

    let mut live: Vec<PoolHandle<Particle>> = (0..4)
        .map(|i| {
            particles.create(Particle {
                position: i as f32,
                velocity: 1.0 + i as f32 * 0.5,
            })
        })
        .collect();

    // watch one slot's teardown the way a cache would
    let _watch = live[1]
        .destruction_event()
        .connect(|_| log::info!("particle slot retiring"));

    let atlas = Handle::with_label("atlas", vec![0_u8; 64]);
    log::info!(
        "{} records alive ({} labelled `atlas`)",
        trace::live_records(),
        trace::live_with_label("atlas")
    );

    for frame in 0..6 {
        let dt = 0.016;
        on_tick.emit(&dt);

        for particle in particles.values_mut().iter_mut() {
            particle.position += particle.velocity * dt as f32;
        }

        if frame == 2 {
            // releasing the handle is all it takes to retire the slot
            let retired = live.swap_remove(1);
            log::info!("retiring particle at index {}", retired.index());
            drop(retired);
        }
    }

    log::info!(
        "{} particles survived {} frames (atlas bytes: {})",
        particles.len(),
        frames.get(),
        atlas.len()
    );

    for handle in &live {
        handle.with(|p| log::info!("particle {} at {:.2}", handle.index(), p.position));
    }
}
