//! Scene access for the export pipeline
//!
//! The pipeline never touches a host scene graph directly. Everything it
//! needs (bones, meshes, vertex groups, poses) goes through [`SceneAdapter`],
//! which is implemented here for two sources:
//! - [`SceneDocument`]: a JSON scene description (`.json`)
//! - [`GltfScene`]: glTF 2.0 files (`.gltf` / `.glb`)

mod document;
mod gltf_scene;

pub use document::SceneDocument;
pub use gltf_scene::GltfScene;

use anyhow::{Context, Result, bail};
use glam::{Mat4, Vec3};
use hashbrown::HashMap;
use md5_common::Aabb;
use std::path::Path;

use crate::diagnostics::Diagnostics;

/// Default sampling rate for sources without an intrinsic frame rate
pub const DEFAULT_FRAME_RATE: u32 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArmatureRef(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoneRef(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshRef(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionRef(pub usize);

/// One face of a source mesh
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    /// Indices into the mesh's vertex positions, one per loop
    pub vertex_indices: Vec<u32>,
    /// Index into the mesh's material list
    pub material_index: usize,
    /// Texture coordinate per loop (top-left origin), if the mesh has a UV layer
    pub uvs: Option<Vec<[f32; 2]>>,
}

/// Read-only view of a skinned scene
///
/// Bone transforms are expressed in the armature's root space, not relative
/// to the parent bone. Pose queries take an explicit frame so sampling never
/// depends on hidden playback state.
pub trait SceneAdapter {
    fn armatures(&self) -> Vec<ArmatureRef>;
    fn armature_name(&self, armature: ArmatureRef) -> &str;
    /// Armature object transform in world space
    fn armature_world_transform(&self, armature: ArmatureRef) -> Mat4;

    /// Bones without a parent, in authoring order
    fn list_root_bones(&self, armature: ArmatureRef) -> Vec<BoneRef>;
    /// Every bone of the armature, reachable or not
    fn list_bones(&self, armature: ArmatureRef) -> Vec<BoneRef>;
    fn find_bone(&self, armature: ArmatureRef, name: &str) -> Option<BoneRef>;
    fn bone_name(&self, bone: BoneRef) -> &str;
    fn bone_parent(&self, bone: BoneRef) -> Option<BoneRef>;
    fn bone_children(&self, bone: BoneRef) -> Vec<BoneRef>;
    /// Rest transform in armature space
    fn bone_local_transform(&self, bone: BoneRef) -> Mat4;

    /// Meshes deformed by the armature
    fn meshes(&self, armature: ArmatureRef) -> Vec<MeshRef>;
    fn mesh_name(&self, mesh: MeshRef) -> &str;
    fn mesh_world_transform(&self, mesh: MeshRef) -> Mat4;
    fn mesh_materials(&self, mesh: MeshRef) -> Vec<String>;
    /// Vertex positions in mesh-local space
    fn mesh_positions(&self, mesh: MeshRef) -> &[Vec3];
    fn mesh_polygons(&self, mesh: MeshRef) -> Vec<Polygon>;
    /// `(bone name, weight)` memberships of one vertex
    fn vertex_groups(&self, mesh: MeshRef, vertex_index: u32) -> Vec<(String, f32)>;

    fn actions(&self, armature: ArmatureRef) -> Vec<ActionRef>;
    fn action_name(&self, action: ActionRef) -> &str;
    /// Inclusive `(first, last)` frame range
    fn animation_frame_range(&self, action: ActionRef) -> (i32, i32);
    fn frame_rate(&self) -> u32;

    /// Armature-space matrix of a bone at `frame`, `None` if the bone is unknown
    fn pose_at(&self, armature: ArmatureRef, action: ActionRef, bone: &str, frame: i32) -> Option<Mat4>;
    /// Whether `action` carries keys for `bone`
    fn animates_bone(&self, armature: ArmatureRef, action: ActionRef, bone: &str) -> bool;

    /// Warnings raised while loading the scene
    fn load_diagnostics(&self) -> Diagnostics {
        Diagnostics::new()
    }

    /// Mesh-local bounding box corners of the deformed mesh at `frame`
    ///
    /// The default skins every vertex with the frame's poses (linear blend)
    /// and boxes the result.
    fn bound_box_corners(
        &self,
        armature: ArmatureRef,
        mesh: MeshRef,
        action: ActionRef,
        frame: i32,
    ) -> [Vec3; 8] {
        skinned_bounds(self, armature, mesh, action, frame).corners()
    }

    fn find_armature(&self, name: &str) -> Option<ArmatureRef> {
        self.armatures()
            .into_iter()
            .find(|&a| self.armature_name(a) == name)
    }

    fn find_mesh(&self, armature: ArmatureRef, name: &str) -> Option<MeshRef> {
        self.meshes(armature)
            .into_iter()
            .find(|&m| self.mesh_name(m) == name)
    }

    fn find_action(&self, armature: ArmatureRef, name: &str) -> Option<ActionRef> {
        self.actions(armature)
            .into_iter()
            .find(|&a| self.action_name(a) == name)
    }
}

/// Mesh-local AABB of a mesh skinned by the poses at `frame`
fn skinned_bounds<A: SceneAdapter + ?Sized>(
    scene: &A,
    armature: ArmatureRef,
    mesh: MeshRef,
    action: ActionRef,
    frame: i32,
) -> Aabb {
    let positions = scene.mesh_positions(mesh);
    if positions.is_empty() {
        return Aabb::default();
    }

    let armature_world = scene.armature_world_transform(armature);
    let mesh_world = scene.mesh_world_transform(mesh);
    // mesh-local -> armature space, and back
    let to_armature = armature_world.inverse() * mesh_world;
    let from_armature = to_armature.inverse();

    // Skinning matrix per bone: pose * inverse(rest)
    let mut skin: HashMap<String, Mat4> = HashMap::new();
    for bone in scene.list_bones(armature) {
        let name = scene.bone_name(bone);
        let rest = scene.bone_local_transform(bone);
        let pose = scene.pose_at(armature, action, name, frame).unwrap_or(rest);
        skin.insert(name.to_string(), pose * rest.inverse());
    }

    Aabb::from_points(positions.iter().enumerate().map(|(i, &local)| {
        let p = to_armature.transform_point3(local);
        let mut blended = Vec3::ZERO;
        let mut total = 0.0;
        for (bone, weight) in scene.vertex_groups(mesh, i as u32) {
            if let Some(m) = skin.get(&bone) {
                blended += m.transform_point3(p) * weight;
                total += weight;
            }
        }
        let skinned = if total > 0.0 { blended / total } else { p };
        from_armature.transform_point3(skinned)
    }))
}

/// Load a scene file, picking the adapter from the extension
///
/// `frame_rate` only applies to sources sampled from continuous time (glTF).
pub fn load_scene(path: &Path, frame_rate: Option<u32>) -> Result<Box<dyn SceneAdapter>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read scene: {:?}", path))?;
            let document = SceneDocument::from_json(&content)
                .with_context(|| format!("Failed to parse scene: {:?}", path))?;
            Ok(Box::new(document))
        }
        "gltf" | "glb" => {
            let scene = GltfScene::load(path, frame_rate.unwrap_or(DEFAULT_FRAME_RATE))?;
            Ok(Box::new(scene))
        }
        _ => bail!(
            "Unsupported scene format: {:?} (use .json, .gltf, or .glb)",
            path
        ),
    }
}

/// Log the armatures, meshes and actions of a scene file
pub fn list_scene(path: &Path, frame_rate: Option<u32>) -> Result<()> {
    let scene = load_scene(path, frame_rate)?;
    let armatures = scene.armatures();
    if armatures.is_empty() {
        tracing::info!("No armatures found in {:?}", path);
        return Ok(());
    }

    tracing::info!("Armatures in {:?}:", path);
    for (i, &armature) in armatures.iter().enumerate() {
        tracing::info!(
            "  [{}] '{}': {} bones",
            i,
            scene.armature_name(armature),
            scene.list_bones(armature).len()
        );
        for mesh in scene.meshes(armature) {
            tracing::info!(
                "      mesh '{}': {} vertices, {} polygons",
                scene.mesh_name(mesh),
                scene.mesh_positions(mesh).len(),
                scene.mesh_polygons(mesh).len()
            );
        }
        for action in scene.actions(armature) {
            let (first, last) = scene.animation_frame_range(action);
            tracing::info!(
                "      action '{}': frames {}..={} at {} fps",
                scene.action_name(action),
                first,
                last,
                scene.frame_rate()
            );
        }
    }

    Ok(())
}
