//! Skeleton builder (armature -> MD5 joints)
//!
//! Walks the bone tree from its roots and assigns joint ids in pre-order, so
//! every joint's id is greater than its parent's.

use glam::{Mat4, Vec3};
use hashbrown::{HashMap, HashSet};
use md5_common::Joint;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{ExportError, Result};
use crate::scene::{ArmatureRef, BoneRef, SceneAdapter};

/// Joints of one armature, plus the lookups later stages need
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub armature: String,
    joints: Vec<Joint>,
    inverse_binds: Vec<Mat4>,
    by_name: HashMap<String, u32>,
}

impl Skeleton {
    /// Joints in id order
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joint(&self, id: u32) -> Option<&Joint> {
        self.joints.get(id as usize)
    }

    pub fn find(&self, name: &str) -> Option<&Joint> {
        self.by_name.get(name).map(|&id| &self.joints[id as usize])
    }

    /// Re-express a world-space point in a joint's bind space
    pub fn to_bind_space(&self, id: u32, world: Vec3) -> Vec3 {
        self.inverse_binds[id as usize].transform_point3(world)
    }
}

/// Build the joint list of `armature`
///
/// Bind matrices are `armature_world * bone_local`; the adapter's bone
/// transforms are already armature-relative so no ancestor chaining happens.
/// Bones not reachable from a root are left out.
pub fn build_skeleton<A: SceneAdapter + ?Sized>(
    scene: &A,
    armature: ArmatureRef,
    diagnostics: &mut Diagnostics,
) -> Result<Skeleton> {
    let armature_name = scene.armature_name(armature).to_string();
    let armature_world = scene.armature_world_transform(armature);

    let mut joints: Vec<Joint> = Vec::new();
    let mut by_name: HashMap<String, u32> = HashMap::new();
    let mut visited: HashSet<BoneRef> = HashSet::new();

    // (bone, parent joint id, parent bone)
    let mut stack: Vec<(BoneRef, Option<u32>, Option<BoneRef>)> = scene
        .list_root_bones(armature)
        .into_iter()
        .rev()
        .map(|bone| (bone, None, None))
        .collect();

    while let Some((bone, parent_id, parent_bone)) = stack.pop() {
        if !visited.insert(bone) {
            continue;
        }
        // Only direct children: a mismatch means the adapter resolved a
        // duplicate name to a different bone
        if scene.bone_parent(bone) != parent_bone {
            continue;
        }

        let name = scene.bone_name(bone);
        if by_name.contains_key(name) {
            diagnostics.warn(
                DiagnosticKind::DuplicateBone,
                &armature_name,
                format!("bone '{}' appears more than once, skipping the later one", name),
            );
            continue;
        }

        let id = joints.len() as u32;
        by_name.insert(name.to_string(), id);
        joints.push(Joint {
            id,
            name: name.to_string(),
            parent: parent_id,
            bind_matrix: armature_world * scene.bone_local_transform(bone),
        });

        for child in scene.bone_children(bone).into_iter().rev() {
            stack.push((child, Some(id), Some(bone)));
        }
    }

    if joints.is_empty() {
        return Err(ExportError::EmptySkeleton(armature_name));
    }

    let unreachable = scene.list_bones(armature).len().saturating_sub(visited.len());
    if unreachable > 0 {
        tracing::debug!(
            "Armature '{}': {} bone(s) not reachable from a root",
            armature_name,
            unreachable
        );
    }

    let inverse_binds = joints.iter().map(|j| j.bind_matrix.inverse()).collect();
    tracing::debug!("Armature '{}': {} joints", armature_name, joints.len());

    Ok(Skeleton {
        armature: armature_name,
        joints,
        inverse_binds,
        by_name,
    })
}
