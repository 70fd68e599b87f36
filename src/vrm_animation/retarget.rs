use glam::{Quat, Vec3};

use crate::animation::{AnimationClip, KeyframeTrack, TargetPath, Track, TrackData};
use crate::vrm::{HumanBoneName, MetaVersion, Vrm};
use crate::vrm_animation::VrmAnimation;

/// Track name used for the look-at rotation.
pub const LOOK_AT_TRACK_NAME: &str = "lookAt";

/// Builds a clip that plays `animation` on `vrm`.
///
/// Humanoid tracks target the avatar's normalized bones, expression tracks
/// its expressions by name. Tracks for bones or expressions the avatar lacks
/// are dropped.
#[must_use]
pub fn create_vrm_animation_clip(animation: &VrmAnimation, vrm: &Vrm) -> AnimationClip {
    let is_vrm0 = vrm.meta.meta_version == MetaVersion::V0;
    let mut tracks = Vec::new();

    // Iterate in bone order so the clip layout is deterministic.
    for &bone in HumanBoneName::ALL {
        let Some(node) = vrm.humanoid.normalized_bone_node(bone) else {
            continue;
        };
        let Some(node_name) = vrm.scene.get_name(node) else {
            continue;
        };

        if let Some(track) = animation.humanoid_tracks.rotation.get(&bone) {
            let track = if is_vrm0 {
                track.clone().map_values(flip_rotation)
            } else {
                track.clone()
            };
            tracks.push(Track::new(node_name, TargetPath::Rotation, TrackData::Quaternion(track)));
        }

        if bone == HumanBoneName::Hips
            && let Some(track) = animation.humanoid_tracks.translation.get(&bone)
        {
            let scale = hips_scale(animation, vrm);
            let track = track.clone().map_values(|v| {
                let v = v * scale;
                if is_vrm0 { flip_translation(v) } else { v }
            });
            tracks.push(Track::new(node_name, TargetPath::Translation, TrackData::Vector3(track)));
        }
    }

    for (preset, track) in &animation.expression_tracks.preset {
        push_expression_track(&mut tracks, vrm, preset.as_str(), track);
    }
    for (name, track) in &animation.expression_tracks.custom {
        push_expression_track(&mut tracks, vrm, name, track);
    }

    if let Some(track) = &animation.look_at_track {
        if vrm.look_at.is_some() {
            tracks.push(Track::new(
                LOOK_AT_TRACK_NAME,
                TargetPath::LookAt,
                TrackData::Quaternion(track.clone()),
            ));
        } else {
            log::debug!("Avatar has no look-at; dropping the look-at track");
        }
    }

    let mut clip = AnimationClip::new(animation.name.clone(), tracks);
    clip.duration = clip.duration.max(animation.duration);
    clip
}

fn push_expression_track(tracks: &mut Vec<Track>, vrm: &Vrm, name: &str, track: &KeyframeTrack<f32>) {
    if vrm.expression_manager.get(name).is_none() {
        log::debug!("Avatar has no expression '{name}'; dropping its track");
        return;
    }
    tracks.push(Track::new(name, TargetPath::Expression, TrackData::Scalar(track.clone())));
}

/// Ratio between the avatar's and the animation's rest hips height.
fn hips_scale(animation: &VrmAnimation, vrm: &Vrm) -> f32 {
    let avatar_height = vrm
        .humanoid
        .normalized_rest_pose()
        .get(&HumanBoneName::Hips)
        .and_then(|pose| pose.position)
        .map_or(0.0, |p| p.y);
    let animation_height = animation.rest_hips_position.y;

    if animation_height.abs() <= f32::EPSILON || avatar_height.abs() <= f32::EPSILON {
        log::warn!("Cannot scale hips translation: rest hips height is zero");
        return 1.0;
    }
    avatar_height / animation_height
}

/// VRM 0.x rigs face -Z: mirror rotations through the Y axis.
fn flip_rotation(q: Quat) -> Quat {
    Quat::from_xyzw(-q.x, q.y, -q.z, q.w)
}

fn flip_translation(v: Vec3) -> Vec3 {
    Vec3::new(-v.x, v.y, -v.z)
}
