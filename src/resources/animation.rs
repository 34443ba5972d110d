use cgmath::{InnerSpace, VectorSpace};

use crate::data_structures::instance::Instance;

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    Other,
}

/// One animated property of one node.
#[derive(Clone, Debug)]
pub struct Channel {
    pub node: usize,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
}

/// An animation clip: a named set of channels sharing one timeline.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: &str, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.timestamps.last().copied())
            .fold(0.0, f32::max);
        Self {
            name: name.to_string(),
            channels,
            duration,
        }
    }

    /// Writes the clip's state at `time` into `pose` (one entry per node).
    pub fn sample(&self, time: f32, pose: &mut [Instance]) {
        for channel in &self.channels {
            let Some(target) = pose.get_mut(channel.node) else {
                continue;
            };
            let Some((i, j, f)) = bracket(&channel.timestamps, time) else {
                continue;
            };
            match &channel.keyframes {
                Keyframes::Translation(values) => {
                    if let (Some(a), Some(b)) = (values.get(i), values.get(j)) {
                        target.position = a.lerp(*b, f);
                    }
                }
                Keyframes::Rotation(values) => {
                    if let (Some(a), Some(b)) = (values.get(i), values.get(j)) {
                        target.rotation = a.nlerp(*b, f).normalize();
                    }
                }
                Keyframes::Scale(values) => {
                    if let (Some(a), Some(b)) = (values.get(i), values.get(j)) {
                        target.scale = a.lerp(*b, f);
                    }
                }
                Keyframes::Other => (),
            }
        }
    }
}

/// Surrounding keyframe indices and the blend factor for `time`, clamped to
/// the first and last keyframe.
fn bracket(timestamps: &[f32], time: f32) -> Option<(usize, usize, f32)> {
    let last = timestamps.len().checked_sub(1)?;
    if time <= timestamps[0] {
        return Some((0, 0, 0.0));
    }
    if time >= timestamps[last] {
        return Some((last, last, 0.0));
    }
    let j = timestamps.partition_point(|&t| t <= time);
    let i = j - 1;
    let span = timestamps[j] - timestamps[i];
    let f = if span > 0.0 {
        (time - timestamps[i]) / span
    } else {
        0.0
    };
    Some((i, j, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door_clip() -> AnimationClip {
        AnimationClip::new(
            "open",
            vec![Channel {
                node: 0,
                timestamps: vec![0.0, 1.0, 2.0],
                keyframes: Keyframes::Translation(vec![
                    [0.0, 0.0, 0.0].into(),
                    [0.0, 1.0, 0.0].into(),
                    [0.0, 3.0, 0.0].into(),
                ]),
            }],
        )
    }

    #[test]
    fn duration_is_last_timestamp() {
        assert_eq!(door_clip().duration, 2.0);
    }

    #[test]
    fn sampling_interpolates_between_keyframes() {
        let mut pose = vec![Instance::default()];
        door_clip().sample(1.5, &mut pose);
        assert!((pose[0].position.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn sampling_clamps_outside_the_timeline() {
        let mut pose = vec![Instance::default()];
        door_clip().sample(10.0, &mut pose);
        assert_eq!(pose[0].position.y, 3.0);
        door_clip().sample(-1.0, &mut pose);
        assert_eq!(pose[0].position.y, 0.0);
    }
}
