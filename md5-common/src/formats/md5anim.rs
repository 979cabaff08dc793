//! MD5 animation text format (.md5anim)
//!
//! # Layout
//! ```text
//! MD5Version 10
//! commandline "<string>"
//!
//! numFrames <F>
//! numJoints <N>
//! frameRate <R>
//! numAnimatedComponents <6*N>
//!
//! hierarchy {
//!     "<name>" <parent> <flags> <channel_start>
//! }
//!
//! bounds {
//!     ( <minx> <miny> <minz> ) ( <maxx> <maxy> <maxz> )
//! }
//!
//! baseframe {
//!     ( <x> <y> <z> ) ( <qx> <qy> <qz> )
//! }
//!
//! frame <f> {
//!     <tx> <ty> <tz> <qx> <qy> <qz>
//! }
//! ```
//!
//! Every joint animates all six components, so `flags` is always
//! [`ALL_CHANNELS`] and `channel_start` advances by [`COMPONENTS_PER_JOINT`].

use std::fmt;

use glam::Vec3;

use super::{Float3, WriteOptions, escape_quoted, write_preamble};
use crate::math::Aabb;

/// Channel mask with Tx, Ty, Tz, Qx, Qy, Qz all animated
pub const ALL_CHANNELS: u32 = 0b11_1111;

/// Animated components stored per joint per frame
pub const COMPONENTS_PER_JOINT: u32 = 6;

/// Per-frame bounding box
pub type Bounds = Aabb;

/// Hierarchy entry for one joint
#[derive(Clone, Debug, PartialEq)]
pub struct JointAnimEntry {
    pub name: String,
    pub parent: Option<u32>,
    pub flags: u32,
    /// Offset of this joint's first component in each frame block
    pub channel_start: u32,
}

impl JointAnimEntry {
    pub fn parent_index(&self) -> i32 {
        self.parent.map_or(-1, |p| p as i32)
    }
}

/// Parent-relative joint transform for one frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JointPose {
    pub translation: Vec3,
    /// Quaternion vector part, already folded by the hemisphere rule
    pub orientation: Vec3,
}

/// One pose per joint, in joint-id order
pub type Frame = Vec<JointPose>;

/// A sampled animation ready for serialization
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationTrack {
    pub joints: Vec<JointAnimEntry>,
    pub frame_rate: u32,
    /// First sampled frame
    pub base_frame: Frame,
    pub frames: Vec<Frame>,
    /// One box per frame
    pub bounds: Vec<Bounds>,
}

impl AnimationTrack {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn animated_components(&self) -> u32 {
        self.joints.len() as u32 * COMPONENTS_PER_JOINT
    }
}

/// Write a complete `.md5anim` document
pub fn write_md5anim<W: fmt::Write>(
    w: &mut W,
    options: &WriteOptions<'_>,
    track: &AnimationTrack,
) -> fmt::Result {
    let scale = options.scale;

    write_preamble(w, options)?;
    writeln!(w, "numFrames {}", track.frame_count())?;
    writeln!(w, "numJoints {}", track.joints.len())?;
    writeln!(w, "frameRate {}", track.frame_rate)?;
    writeln!(w, "numAnimatedComponents {}", track.animated_components())?;
    writeln!(w)?;

    writeln!(w, "hierarchy {{")?;
    for joint in &track.joints {
        writeln!(
            w,
            "\t\"{}\" {} {} {}",
            escape_quoted(&joint.name),
            joint.parent_index(),
            joint.flags,
            joint.channel_start
        )?;
    }
    writeln!(w, "}}")?;
    writeln!(w)?;

    writeln!(w, "bounds {{")?;
    for bounds in &track.bounds {
        writeln!(
            w,
            "\t( {} ) ( {} )",
            Float3((bounds.min * scale).to_array()),
            Float3((bounds.max * scale).to_array()),
        )?;
    }
    writeln!(w, "}}")?;
    writeln!(w)?;

    writeln!(w, "baseframe {{")?;
    for pose in &track.base_frame {
        writeln!(
            w,
            "\t( {} ) ( {} )",
            Float3((pose.translation * scale).to_array()),
            Float3(pose.orientation.to_array()),
        )?;
    }
    writeln!(w, "}}")?;
    writeln!(w)?;

    for (index, frame) in track.frames.iter().enumerate() {
        writeln!(w, "frame {} {{", index)?;
        for pose in frame {
            writeln!(
                w,
                "\t{} {}",
                Float3((pose.translation * scale).to_array()),
                Float3(pose.orientation.to_array()),
            )?;
        }
        writeln!(w, "}}")?;
        writeln!(w)?;
    }

    Ok(())
}

/// Render a `.md5anim` document to a string
pub fn md5anim_to_string(options: &WriteOptions<'_>, track: &AnimationTrack) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_md5anim(&mut out, options, track);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_joint_track() -> AnimationTrack {
        let pose = JointPose {
            translation: Vec3::new(1.0, 2.0, 3.0),
            orientation: Vec3::new(-0.5, -0.5, -0.3),
        };
        let child = JointPose {
            translation: Vec3::new(0.0, 1.0, 0.0),
            orientation: Vec3::ZERO,
        };
        AnimationTrack {
            joints: vec![
                JointAnimEntry {
                    name: "root".into(),
                    parent: None,
                    flags: ALL_CHANNELS,
                    channel_start: 0,
                },
                JointAnimEntry {
                    name: "spine".into(),
                    parent: Some(0),
                    flags: ALL_CHANNELS,
                    channel_start: COMPONENTS_PER_JOINT,
                },
            ],
            frame_rate: 24,
            base_frame: vec![pose, child],
            frames: vec![vec![pose, child]],
            bounds: vec![Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))],
        }
    }

    #[test]
    fn test_md5anim_exact_text() {
        let options = WriteOptions {
            commandline: "test",
            scale: 1.0,
        };
        let text = md5anim_to_string(&options, &two_joint_track());
        let expected = "\
MD5Version 10
commandline \"test\"

numFrames 1
numJoints 2
frameRate 24
numAnimatedComponents 12

hierarchy {
\t\"root\" -1 63 0
\t\"spine\" 0 63 6
}

bounds {
\t( -1.000000 -1.000000 -1.000000 ) ( 1.000000 1.000000 1.000000 )
}

baseframe {
\t( 1.000000 2.000000 3.000000 ) ( -0.500000 -0.500000 -0.300000 )
\t( 0.000000 1.000000 0.000000 ) ( 0.000000 0.000000 0.000000 )
}

frame 0 {
\t1.000000 2.000000 3.000000 -0.500000 -0.500000 -0.300000
\t0.000000 1.000000 0.000000 0.000000 0.000000 0.000000
}

";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_scale_applies_to_translations_and_bounds_only() {
        let options = WriteOptions {
            commandline: "",
            scale: 2.0,
        };
        let text = md5anim_to_string(&options, &two_joint_track());
        assert!(text.contains("\t( -2.000000 -2.000000 -2.000000 ) ( 2.000000 2.000000 2.000000 )\n"));
        assert!(text.contains("\t( 2.000000 4.000000 6.000000 ) ( -0.500000 -0.500000 -0.300000 )\n"));
        assert!(text.contains("\t2.000000 4.000000 6.000000 -0.500000 -0.500000 -0.300000\n"));
    }

    #[test]
    fn test_animated_components() {
        let track = two_joint_track();
        assert_eq!(track.animated_components(), 12);
        assert_eq!(track.frame_count(), 1);
    }

    #[test]
    fn test_frame_blocks_numbered_from_zero() {
        let mut track = two_joint_track();
        let frame = track.frames[0].clone();
        track.frames.push(frame.clone());
        track.frames.push(frame);
        let text = md5anim_to_string(&WriteOptions::default(), &track);
        assert!(text.contains("numFrames 3\n"));
        assert!(text.contains("frame 0 {\n"));
        assert!(text.contains("frame 2 {\n"));
        assert!(!text.contains("frame 3 {"));
    }
}
