//! JSON scene description (.json)
//!
//! A flat, host-independent dump of a skinned scene. Host plugins write it,
//! the exporter reads it. Bone rest transforms and pose keys are given in
//! armature space; pose keys are indexed by frame number and interpolated
//! between keys.
//!
//! ```json
//! {
//!   "frame_rate": 24,
//!   "armatures": [{ "name": "Armature", "bones": [{ "name": "root" }] }],
//!   "meshes": [{
//!     "name": "Body", "armature": "Armature", "materials": ["skin"],
//!     "vertices": [{ "position": [0, 0, 0], "groups": [["root", 1.0]] }],
//!     "polygons": [{ "vertices": [0, 1, 2], "uvs": [[0, 0], [1, 0], [0, 1]] }]
//!   }],
//!   "actions": [{
//!     "name": "Idle", "armature": "Armature", "frame_start": 1, "frame_end": 10,
//!     "tracks": [{ "bone": "root", "keys": [{ "frame": 1, "translation": [0, 0, 0] }] }]
//!   }]
//! }
//! ```

use anyhow::{Context, Result, bail};
use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;
use serde::Deserialize;

use super::{ActionRef, ArmatureRef, BoneRef, MeshRef, Polygon, SceneAdapter};
use crate::interpolate::{Interpolation, interpolate_quat, interpolate_vec3};

fn default_frame_rate() -> u32 {
    super::DEFAULT_FRAME_RATE
}

fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Translation / rotation (xyzw) / scale
#[derive(Clone, Copy, Debug, Deserialize)]
struct TransformDef {
    #[serde(default)]
    translation: [f32; 3],
    #[serde(default = "default_rotation")]
    rotation: [f32; 4],
    #[serde(default = "default_scale")]
    scale: [f32; 3],
}

impl Default for TransformDef {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: default_rotation(),
            scale: default_scale(),
        }
    }
}

impl TransformDef {
    fn to_mat4(self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            Quat::from_array(self.rotation).normalize(),
            Vec3::from(self.translation),
        )
    }
}

#[derive(Debug, Deserialize)]
struct SceneFile {
    #[serde(default = "default_frame_rate")]
    frame_rate: u32,
    #[serde(default)]
    armatures: Vec<ArmatureDef>,
    #[serde(default)]
    meshes: Vec<MeshDef>,
    #[serde(default)]
    actions: Vec<ActionDef>,
}

#[derive(Debug, Deserialize)]
struct ArmatureDef {
    name: String,
    #[serde(default)]
    transform: TransformDef,
    #[serde(default)]
    bones: Vec<BoneDef>,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    /// Rest transform in armature space
    #[serde(default)]
    rest: TransformDef,
}

#[derive(Debug, Deserialize)]
struct MeshDef {
    name: String,
    armature: String,
    #[serde(default)]
    transform: TransformDef,
    #[serde(default)]
    materials: Vec<String>,
    #[serde(default)]
    vertices: Vec<VertexDef>,
    #[serde(default)]
    polygons: Vec<PolygonDef>,
}

#[derive(Debug, Deserialize)]
struct VertexDef {
    position: [f32; 3],
    #[serde(default)]
    groups: Vec<(String, f32)>,
}

#[derive(Debug, Deserialize)]
struct PolygonDef {
    vertices: Vec<u32>,
    #[serde(default)]
    material: usize,
    #[serde(default)]
    uvs: Option<Vec<[f32; 2]>>,
}

#[derive(Debug, Deserialize)]
struct ActionDef {
    name: String,
    armature: String,
    frame_start: i32,
    frame_end: i32,
    #[serde(default)]
    tracks: Vec<TrackDef>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum InterpolationDef {
    #[default]
    Linear,
    Step,
}

#[derive(Debug, Deserialize)]
struct TrackDef {
    bone: String,
    #[serde(default)]
    interpolation: InterpolationDef,
    keys: Vec<KeyDef>,
}

#[derive(Debug, Deserialize)]
struct KeyDef {
    frame: f32,
    #[serde(flatten)]
    transform: TransformDef,
}

// ============================================================================
// Resolved scene
// ============================================================================

#[derive(Debug)]
struct Armature {
    name: String,
    world: Mat4,
    bones: Vec<usize>,
    roots: Vec<usize>,
    by_name: HashMap<String, usize>,
}

#[derive(Debug)]
struct Bone {
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    rest: Mat4,
}

#[derive(Debug)]
struct Mesh {
    name: String,
    armature: usize,
    world: Mat4,
    materials: Vec<String>,
    positions: Vec<Vec3>,
    groups: Vec<Vec<(String, f32)>>,
    polygons: Vec<Polygon>,
}

#[derive(Debug)]
struct Track {
    interpolation: Interpolation,
    times: Vec<f32>,
    translations: Vec<Vec3>,
    rotations: Vec<Quat>,
    scales: Vec<Vec3>,
}

impl Track {
    fn sample(&self, frame: f32) -> Option<Mat4> {
        let t = interpolate_vec3(&self.times, &self.translations, frame, self.interpolation)?;
        let r = interpolate_quat(&self.times, &self.rotations, frame, self.interpolation)?;
        let s = interpolate_vec3(&self.times, &self.scales, frame, self.interpolation)?;
        Some(Mat4::from_scale_rotation_translation(s, r, t))
    }
}

#[derive(Debug)]
struct Action {
    name: String,
    armature: usize,
    range: (i32, i32),
    tracks: HashMap<String, Track>,
}

/// Scene loaded from a JSON description
#[derive(Debug)]
pub struct SceneDocument {
    frame_rate: u32,
    armatures: Vec<Armature>,
    bones: Vec<Bone>,
    meshes: Vec<Mesh>,
    actions: Vec<Action>,
}

impl SceneDocument {
    /// Parse and resolve a JSON scene description
    pub fn from_json(content: &str) -> Result<Self> {
        let file: SceneFile = serde_json::from_str(content).context("Invalid scene JSON")?;
        Self::resolve(file)
    }

    fn resolve(file: SceneFile) -> Result<Self> {
        let mut armatures = Vec::with_capacity(file.armatures.len());
        let mut bones: Vec<Bone> = Vec::new();

        for def in file.armatures {
            let first = bones.len();
            let mut by_name = HashMap::new();
            for (i, bone) in def.bones.iter().enumerate() {
                // First bone wins on duplicate names
                by_name.entry(bone.name.clone()).or_insert(first + i);
            }

            for bone in &def.bones {
                let parent = match &bone.parent {
                    Some(name) => Some(*by_name.get(name).with_context(|| {
                        format!(
                            "Bone '{}' in armature '{}' has unknown parent '{}'",
                            bone.name, def.name, name
                        )
                    })?),
                    None => None,
                };
                bones.push(Bone {
                    name: bone.name.clone(),
                    parent,
                    children: Vec::new(),
                    rest: bone.rest.to_mat4(),
                });
            }

            let indices: Vec<usize> = (first..bones.len()).collect();
            for &i in &indices {
                if let Some(p) = bones[i].parent {
                    bones[p].children.push(i);
                }
            }
            let roots = indices
                .iter()
                .copied()
                .filter(|&i| bones[i].parent.is_none())
                .collect();

            armatures.push(Armature {
                name: def.name,
                world: def.transform.to_mat4(),
                bones: indices,
                roots,
                by_name,
            });
        }

        let armature_index = |name: &str| -> Result<usize> {
            armatures
                .iter()
                .position(|a| a.name == name)
                .with_context(|| format!("Unknown armature '{}'", name))
        };

        let mut meshes = Vec::with_capacity(file.meshes.len());
        for def in file.meshes {
            let armature = armature_index(&def.armature)
                .with_context(|| format!("Mesh '{}'", def.name))?;
            let (positions, groups) = def
                .vertices
                .into_iter()
                .map(|v| (Vec3::from(v.position), v.groups))
                .unzip();
            let polygons = def
                .polygons
                .into_iter()
                .map(|p| Polygon {
                    vertex_indices: p.vertices,
                    material_index: p.material,
                    uvs: p.uvs,
                })
                .collect();
            meshes.push(Mesh {
                name: def.name,
                armature,
                world: def.transform.to_mat4(),
                materials: def.materials,
                positions,
                groups,
                polygons,
            });
        }

        let mut actions = Vec::with_capacity(file.actions.len());
        for def in file.actions {
            let armature = armature_index(&def.armature)
                .with_context(|| format!("Action '{}'", def.name))?;
            let mut tracks = HashMap::new();
            for track in def.tracks {
                if track.keys.is_empty() {
                    bail!("Action '{}': track for '{}' has no keys", def.name, track.bone);
                }
                let mut keys = track.keys;
                keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
                let interpolation = match track.interpolation {
                    InterpolationDef::Linear => Interpolation::Linear,
                    InterpolationDef::Step => Interpolation::Step,
                };
                tracks.insert(
                    track.bone,
                    Track {
                        interpolation,
                        times: keys.iter().map(|k| k.frame).collect(),
                        translations: keys.iter().map(|k| Vec3::from(k.transform.translation)).collect(),
                        rotations: keys
                            .iter()
                            .map(|k| Quat::from_array(k.transform.rotation).normalize())
                            .collect(),
                        scales: keys.iter().map(|k| Vec3::from(k.transform.scale)).collect(),
                    },
                );
            }
            actions.push(Action {
                name: def.name,
                armature,
                range: (def.frame_start, def.frame_end),
                tracks,
            });
        }

        Ok(Self {
            frame_rate: file.frame_rate,
            armatures,
            bones,
            meshes,
            actions,
        })
    }
}

impl SceneAdapter for SceneDocument {
    fn armatures(&self) -> Vec<ArmatureRef> {
        (0..self.armatures.len()).map(ArmatureRef).collect()
    }

    fn armature_name(&self, armature: ArmatureRef) -> &str {
        &self.armatures[armature.0].name
    }

    fn armature_world_transform(&self, armature: ArmatureRef) -> Mat4 {
        self.armatures[armature.0].world
    }

    fn list_root_bones(&self, armature: ArmatureRef) -> Vec<BoneRef> {
        self.armatures[armature.0].roots.iter().copied().map(BoneRef).collect()
    }

    fn list_bones(&self, armature: ArmatureRef) -> Vec<BoneRef> {
        self.armatures[armature.0].bones.iter().copied().map(BoneRef).collect()
    }

    fn find_bone(&self, armature: ArmatureRef, name: &str) -> Option<BoneRef> {
        self.armatures[armature.0].by_name.get(name).copied().map(BoneRef)
    }

    fn bone_name(&self, bone: BoneRef) -> &str {
        &self.bones[bone.0].name
    }

    fn bone_parent(&self, bone: BoneRef) -> Option<BoneRef> {
        self.bones[bone.0].parent.map(BoneRef)
    }

    fn bone_children(&self, bone: BoneRef) -> Vec<BoneRef> {
        self.bones[bone.0].children.iter().copied().map(BoneRef).collect()
    }

    fn bone_local_transform(&self, bone: BoneRef) -> Mat4 {
        self.bones[bone.0].rest
    }

    fn meshes(&self, armature: ArmatureRef) -> Vec<MeshRef> {
        self.meshes
            .iter()
            .enumerate()
            .filter(|(_, m)| m.armature == armature.0)
            .map(|(i, _)| MeshRef(i))
            .collect()
    }

    fn mesh_name(&self, mesh: MeshRef) -> &str {
        &self.meshes[mesh.0].name
    }

    fn mesh_world_transform(&self, mesh: MeshRef) -> Mat4 {
        self.meshes[mesh.0].world
    }

    fn mesh_materials(&self, mesh: MeshRef) -> Vec<String> {
        self.meshes[mesh.0].materials.clone()
    }

    fn mesh_positions(&self, mesh: MeshRef) -> &[Vec3] {
        &self.meshes[mesh.0].positions
    }

    fn mesh_polygons(&self, mesh: MeshRef) -> Vec<Polygon> {
        self.meshes[mesh.0].polygons.clone()
    }

    fn vertex_groups(&self, mesh: MeshRef, vertex_index: u32) -> Vec<(String, f32)> {
        self.meshes[mesh.0]
            .groups
            .get(vertex_index as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn actions(&self, armature: ArmatureRef) -> Vec<ActionRef> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.armature == armature.0)
            .map(|(i, _)| ActionRef(i))
            .collect()
    }

    fn action_name(&self, action: ActionRef) -> &str {
        &self.actions[action.0].name
    }

    fn animation_frame_range(&self, action: ActionRef) -> (i32, i32) {
        self.actions[action.0].range
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn pose_at(&self, armature: ArmatureRef, action: ActionRef, bone: &str, frame: i32) -> Option<Mat4> {
        let action = self.actions.get(action.0)?;
        if action.armature != armature.0 {
            return None;
        }
        let bone_index = *self.armatures[armature.0].by_name.get(bone)?;
        match action.tracks.get(bone) {
            Some(track) => track.sample(frame as f32),
            None => Some(self.bones[bone_index].rest),
        }
    }

    fn animates_bone(&self, armature: ArmatureRef, action: ActionRef, bone: &str) -> bool {
        self.actions
            .get(action.0)
            .is_some_and(|a| a.armature == armature.0 && a.tracks.contains_key(bone))
    }
}
