use glam::{Quat, Vec3};

use crate::animation::binding::TargetPath;
use crate::animation::tracks::KeyframeTrack;
use crate::animation::values::MorphWeightData;

#[derive(Debug, Clone)]
pub struct TrackMeta {
    /// Node name for node properties, expression name for expression tracks.
    pub node_name: String,
    pub target: TargetPath,
}

#[derive(Debug, Clone)]
pub enum TrackData {
    Vector3(KeyframeTrack<Vec3>),
    Quaternion(KeyframeTrack<Quat>),
    Scalar(KeyframeTrack<f32>),
    MorphWeights(KeyframeTrack<MorphWeightData>),
}

impl TrackData {
    #[must_use]
    pub fn duration(&self) -> f32 {
        match self {
            TrackData::Vector3(track) => track.duration(),
            TrackData::Quaternion(track) => track.duration(),
            TrackData::Scalar(track) => track.duration(),
            TrackData::MorphWeights(track) => track.duration(),
        }
    }
}

/// A complete track definition: metadata plus keyframe data.
#[derive(Debug, Clone)]
pub struct Track {
    pub meta: TrackMeta,
    pub data: TrackData,
}

impl Track {
    #[must_use]
    pub fn new(node_name: impl Into<String>, target: TargetPath, data: TrackData) -> Self {
        Self {
            meta: TrackMeta {
                node_name: node_name.into(),
                target,
            },
            data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    /// Builds a clip whose duration is the latest keyframe over all tracks.
    #[must_use]
    pub fn new(name: String, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .map(|t| t.data.duration())
            .fold(0.0_f32, f32::max);

        Self {
            name,
            duration,
            tracks,
        }
    }

    /// Finds the first track animating `target` on `node_name`.
    #[must_use]
    pub fn find_track(&self, node_name: &str, target: TargetPath) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.meta.target == target && t.meta.node_name == node_name)
    }
}
