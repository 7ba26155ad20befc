//! scene-runner: headless driver for the playfield kernel.
//!
//! Usage:
//!   scene-runner --seed 42 --frames 600
//!   scene-runner --scene scene.json --frames 600

use anyhow::Result;
use playfield_core::{
    collision::CollisionShape,
    config::{ObjectTypeConfig, Placement, SceneConfig},
    engine::Kernel,
    language::CelEngine,
    sequence::SequenceEntry,
    types::Value,
};
use std::collections::BTreeMap;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let frames = parse_arg(&args, "--frames", 600u64);
    let scene_path = args
        .windows(2)
        .find(|w| w[0] == "--scene")
        .map(|w| w[1].clone());

    let scene = match &scene_path {
        Some(path) => SceneConfig::load(path)?,
        None => demo_scene(seed),
    };

    println!("playfield — scene-runner");
    println!("  seed:   {}", scene.seed);
    println!("  frames: {frames}");
    println!("  scene:  {}", scene_path.as_deref().unwrap_or("<built-in demo>"));
    println!();

    let mut kernel = Kernel::build(&scene, Box::new(CelEngine::new()))?;
    kernel.run_frames(frames)?;
    print_summary(&kernel, &scene, frames);
    Ok(())
}

/// A bouncing ball penned in by four solid walls, plus a wanderer that
/// re-rolls its direction every frame.
fn demo_scene(seed: u64) -> SceneConfig {
    let entry = |name: &str, params: &[(&str, Value)]| {
        SequenceEntry::new(
            name,
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    };

    let mut ball = ObjectTypeConfig {
        name: "obj_ball".to_string(),
        visible: true,
        solid: false,
        depth: 0,
        shape: CollisionShape::Disk,
        size: (12, 12),
        mask_rows: None,
        events: BTreeMap::new(),
    };
    ball.events.insert(
        "collision_obj_wall".to_string(),
        vec![entry(
            "bounce_off_collider",
            &[("precision", Value::from("precise"))],
        )],
    );
    ball.events.insert(
        "intersect_boundary".to_string(),
        vec![entry("bounce_off_collider", &[])],
    );

    let wall = ObjectTypeConfig {
        name: "obj_wall".to_string(),
        visible: true,
        solid: true,
        depth: 0,
        shape: CollisionShape::Rectangle,
        size: (32, 32),
        mask_rows: None,
        events: BTreeMap::new(),
    };

    let mut wanderer = ObjectTypeConfig {
        name: "obj_wanderer".to_string(),
        visible: true,
        solid: false,
        depth: 0,
        shape: CollisionShape::Rectangle,
        size: (8, 8),
        mask_rows: None,
        events: BTreeMap::new(),
    };
    wanderer.events.insert(
        "begin_step".to_string(),
        vec![entry(
            "set_velocity_compass",
            &[
                (
                    "compass_directions",
                    Value::from("UP|UPRIGHT|RIGHT|DOWNRIGHT|DOWN|DOWNLEFT|LEFT|UPLEFT"),
                ),
                ("speed", Value::Float(2.0)),
            ],
        )],
    );

    SceneConfig {
        room: (320, 240),
        seed,
        objects: vec![ball, wall, wanderer],
        placements: vec![
            Placement {
                object: "obj_ball".to_string(),
                position: (60.0, 60.0),
                speed: 3.0,
                direction: 135.0,
            },
            Placement {
                object: "obj_wall".to_string(),
                position: (144.0, 104.0),
                speed: 0.0,
                direction: 0.0,
            },
            Placement {
                object: "obj_wanderer".to_string(),
                position: (40.0, 180.0),
                speed: 0.0,
                direction: 0.0,
            },
        ],
    }
}

fn print_summary(kernel: &Kernel, scene: &SceneConfig, frames: u64) {
    println!("=== RUN SUMMARY ===");
    println!("  frames run:     {frames}");
    println!("  live instances: {}", kernel.live_instance_count());
    for object in &scene.objects {
        let ids = kernel.instances_of(&object.name);
        for id in ids {
            if let Some(instance) = kernel.instance(id) {
                println!(
                    "  {} #{id}: pos ({:.1}, {:.1}) speed {:.1} dir {:.1}",
                    object.name,
                    instance.position.0,
                    instance.position.1,
                    instance.speed(),
                    instance.direction()
                );
            }
        }
    }

    let mut deliveries: BTreeMap<&str, u64> = BTreeMap::new();
    for record in kernel.event_log() {
        *deliveries.entry(record.event.as_str()).or_default() += 1;
    }
    println!();
    println!("=== EVENT DELIVERIES ===");
    if deliveries.is_empty() {
        println!("  (none)");
    }
    for (name, count) in deliveries {
        println!("  {name:24} {count}");
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
