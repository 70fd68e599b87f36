//! VRMA player
//!
//! Loads a VRM avatar and a VRM animation concurrently, retargets the clip
//! onto the avatar's normalized rig and runs a fixed-step frame loop with the
//! spring bones, look-at and expressions active.
//!
//! Run: cargo run -p vrma_player -- [model.vrm] [animation.vrma] [--seconds N] [--pause-at T] [--scrub T]

use anima::{AssetServer, AvatarPlayer, HumanBoneName, PlayerSettings};
use anyhow::Context;
use glam::Vec3;

/// Where the viewer's camera would sit.
const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 1.0, 5.0);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", PlayerSettings::USAGE);
        return Ok(());
    }
    let settings = PlayerSettings::from_args(args)?;

    // 1. Load both files concurrently
    let assets = AssetServer::new();
    let model_path = settings.model_path.to_string_lossy().into_owned();
    let animation_path = settings.animation_path.to_string_lossy().into_owned();

    let loaded = tokio::try_join!(
        assets.load_vrm(&model_path),
        assets.load_vrm_animation(&animation_path),
    );
    let (mut vrm, animations) = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            log::error!("Failed to load assets: {err}");
            return Err(err.into());
        }
    };

    let animation = animations
        .first()
        .with_context(|| format!("{animation_path} contains no animation"))?;

    // 2. Face +Z regardless of the VRM version
    vrm.rotate_vrm0();
    // Without a look-at track the eyes follow the camera
    if animation.look_at_track.is_none()
        && let Some(look_at) = vrm.look_at.as_mut()
    {
        look_at.target = Some(CAMERA_POSITION);
    }

    // 3. Retarget and play
    let mut player = AvatarPlayer::new(vrm, animation);
    if let Some(controls) = player.controls() {
        println!(
            "Clip '{}': {:.2}s, button reads '{}'",
            animation.name,
            controls.duration(),
            controls.button_label()
        );
    }

    let frames = player.run(&settings);

    // 4. Report the final pose
    let vrm = player.vrm();
    let hips = vrm
        .humanoid
        .raw_bone_node(HumanBoneName::Hips)
        .map_or(Vec3::ZERO, |h| vrm.scene.world_position(h));
    println!(
        "Simulated {frames} frames ({:.2}s); clip time {:.3}s; hips at {hips:.3}; {} spring joints",
        player.elapsed(),
        player.action().map_or(0.0, |a| a.time),
        vrm.spring_bone_manager.joints().len()
    );

    Ok(())
}
