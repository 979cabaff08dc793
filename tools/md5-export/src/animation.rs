//! Animation sampler (action -> MD5 animation track)
//!
//! Samples every frame of an inclusive range in increasing order. Each joint
//! is stored relative to its parent; roots are stored in the armature's world
//! space. The first sampled frame doubles as the baseframe.

use glam::Mat4;
use hashbrown::HashSet;
use md5_common::{
    ALL_CHANNELS, AnimationTrack, Bounds, COMPONENTS_PER_JOINT, Frame, JointAnimEntry, JointPose,
    decompose, hemisphere_xyz, min_max,
};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{ExportError, Result};
use crate::scene::{ActionRef, ArmatureRef, MeshRef, SceneAdapter};
use crate::skeleton::Skeleton;

/// Hierarchy entries in joint-id order
pub fn build_hierarchy(skeleton: &Skeleton) -> Vec<JointAnimEntry> {
    skeleton
        .joints()
        .iter()
        .map(|joint| JointAnimEntry {
            name: joint.name.clone(),
            parent: joint.parent,
            flags: ALL_CHANNELS,
            channel_start: joint.id * COMPONENTS_PER_JOINT,
        })
        .collect()
}

/// World-space box around every mesh at `frame`
///
/// Meshes without vertices are ignored. Zero when no mesh has any.
pub fn frame_bounds<A: SceneAdapter + ?Sized>(
    scene: &A,
    armature: ArmatureRef,
    action: ActionRef,
    meshes: &[MeshRef],
    frame: i32,
) -> Bounds {
    let meshes = meshes
        .iter()
        .copied()
        .filter(|&mesh| !scene.mesh_positions(mesh).is_empty());
    let corners = meshes.flat_map(|mesh| {
        let world = scene.mesh_world_transform(mesh);
        scene
            .bound_box_corners(armature, mesh, action, frame)
            .map(|corner| world.transform_point3(corner))
    });
    let (min, max) = min_max(corners);
    Bounds::new(min, max)
}

fn joint_pose(matrix: &Mat4) -> JointPose {
    let (translation, rotation) = decompose(matrix);
    JointPose {
        translation,
        orientation: hemisphere_xyz(rotation),
    }
}

/// Sample `action` over its frame range into an [`AnimationTrack`]
///
/// A joint without a pose at some frame falls back to its rest pose and is
/// reported once. Bones of the armature that are missing from the skeleton
/// are reported once and contribute nothing.
pub fn sample_animation<A: SceneAdapter + ?Sized>(
    scene: &A,
    armature: ArmatureRef,
    action: ActionRef,
    skeleton: &Skeleton,
    meshes: &[MeshRef],
    diagnostics: &mut Diagnostics,
) -> Result<AnimationTrack> {
    let action_name = scene.action_name(action).to_string();
    let (first, last) = scene.animation_frame_range(action);
    if last < first {
        return Err(ExportError::EmptyFrameRange {
            name: action_name,
            first,
            last,
        });
    }

    for bone in scene.list_bones(armature) {
        let name = scene.bone_name(bone);
        if skeleton.find(name).is_none() && scene.animates_bone(armature, action, name) {
            diagnostics.warn(
                DiagnosticKind::UnknownBone,
                &action_name,
                format!("bone '{}' is not in the exported skeleton, skipping its animation", name),
            );
        }
    }

    let armature_world = scene.armature_world_transform(armature);
    let armature_inverse = armature_world.inverse();
    let rest: Vec<Mat4> = skeleton
        .joints()
        .iter()
        .map(|joint| armature_inverse * joint.bind_matrix)
        .collect();

    let mut missing: HashSet<u32> = HashSet::new();
    let mut frames: Vec<Frame> = Vec::with_capacity((last - first + 1) as usize);
    let mut bounds: Vec<Bounds> = Vec::with_capacity(frames.capacity());

    for frame in first..=last {
        let poses: Vec<Mat4> = skeleton
            .joints()
            .iter()
            .map(|joint| match scene.pose_at(armature, action, &joint.name, frame) {
                Some(pose) => pose,
                None => {
                    if missing.insert(joint.id) {
                        diagnostics.warn(
                            DiagnosticKind::MissingPose,
                            &action_name,
                            format!(
                                "no pose for joint '{}' at frame {}, using its rest pose",
                                joint.name, frame
                            ),
                        );
                    }
                    rest[joint.id as usize]
                }
            })
            .collect();

        let sampled: Frame = skeleton
            .joints()
            .iter()
            .map(|joint| {
                let pose = poses[joint.id as usize];
                let relative = match joint.parent {
                    Some(parent) => poses[parent as usize].inverse() * pose,
                    None => armature_world * pose,
                };
                joint_pose(&relative)
            })
            .collect();

        frames.push(sampled);
        bounds.push(frame_bounds(scene, armature, action, meshes, frame));
    }

    tracing::debug!(
        "Action '{}': sampled frames {}..={} ({} joints)",
        action_name,
        first,
        last,
        skeleton.len()
    );

    Ok(AnimationTrack {
        joints: build_hierarchy(skeleton),
        frame_rate: scene.frame_rate(),
        base_frame: frames[0].clone(),
        frames,
        bounds,
    })
}
