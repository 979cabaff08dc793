//! glTF 2.0 scene adapter (.gltf / .glb)
//!
//! Each skin becomes an armature whose bones are the skin's joints. Bind
//! transforms come from the inverse bind matrices, skinned mesh nodes become
//! meshes, and animations are sampled at a fixed frame rate.

use anyhow::{Context, Result, bail};
use glam::{Mat4, Quat, Vec3};
use hashbrown::{HashMap, HashSet};
use std::path::Path;

use super::{ActionRef, ArmatureRef, BoneRef, MeshRef, Polygon, SceneAdapter};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::interpolate::{Interpolation, interpolate_quat, interpolate_vec3};

#[derive(Debug)]
struct Node {
    parent: Option<usize>,
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

#[derive(Debug)]
struct Armature {
    name: String,
    bones: Vec<usize>,
    roots: Vec<usize>,
    joint_nodes: HashSet<usize>,
}

#[derive(Debug)]
struct Bone {
    name: String,
    node: usize,
    parent: Option<usize>,
    children: Vec<usize>,
    bind: Mat4,
}

#[derive(Debug)]
struct Mesh {
    name: String,
    armature: usize,
    materials: Vec<String>,
    positions: Vec<Vec3>,
    groups: Vec<Vec<(String, f32)>>,
    polygons: Vec<Polygon>,
}

#[derive(Debug)]
struct Channel<T> {
    interpolation: Interpolation,
    times: Vec<f32>,
    values: Vec<T>,
}

#[derive(Debug, Default)]
struct NodeTracks {
    translation: Option<Channel<Vec3>>,
    rotation: Option<Channel<Quat>>,
    scale: Option<Channel<Vec3>>,
}

#[derive(Debug)]
struct Animation {
    name: String,
    duration: f32,
    tracks: HashMap<usize, NodeTracks>,
}

/// Scene loaded from a glTF/GLB file
#[derive(Debug)]
pub struct GltfScene {
    frame_rate: u32,
    nodes: Vec<Node>,
    armatures: Vec<Armature>,
    bones: Vec<Bone>,
    meshes: Vec<Mesh>,
    animations: Vec<Animation>,
    diagnostics: Diagnostics,
}

impl GltfScene {
    /// Load a glTF/GLB file, sampling animations at `frame_rate`
    pub fn load(input: &Path, frame_rate: u32) -> Result<Self> {
        if frame_rate == 0 {
            bail!("Frame rate must be positive");
        }
        let (document, buffers, _images) =
            gltf::import(input).with_context(|| format!("Failed to load glTF: {:?}", input))?;

        let mut nodes: Vec<Node> = document
            .nodes()
            .map(|node| {
                let (t, r, s) = node.transform().decomposed();
                Node {
                    parent: None,
                    translation: Vec3::from(t),
                    rotation: Quat::from_array(r).normalize(),
                    scale: Vec3::from(s),
                }
            })
            .collect();
        for node in document.nodes() {
            for child in node.children() {
                nodes[child.index()].parent = Some(node.index());
            }
        }

        let node_names: Vec<String> = document
            .nodes()
            .map(|n| {
                n.name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("joint_{}", n.index()))
            })
            .collect();

        let mut scene = Self {
            frame_rate,
            nodes,
            armatures: Vec::new(),
            bones: Vec::new(),
            meshes: Vec::new(),
            animations: Vec::new(),
            diagnostics: Diagnostics::new(),
        };

        for skin in document.skins() {
            scene.add_skin(&skin, &buffers, &node_names);
        }

        for node in document.nodes() {
            let (Some(mesh), Some(skin)) = (node.mesh(), node.skin()) else {
                continue;
            };
            let name = node
                .name()
                .or(mesh.name())
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
            let joint_names: Vec<&str> = skin
                .joints()
                .map(|j| node_names[j.index()].as_str())
                .collect();
            let converted = read_mesh(
                &mesh,
                &buffers,
                &joint_names,
                skin.index(),
                name,
                &mut scene.diagnostics,
            )?;
            scene.meshes.push(converted);
        }

        for animation in document.animations() {
            scene.animations.push(read_animation(&animation, &buffers)?);
        }

        tracing::debug!(
            "Loaded glTF {:?}: {} armatures, {} meshes, {} animations",
            input,
            scene.armatures.len(),
            scene.meshes.len(),
            scene.animations.len()
        );

        Ok(scene)
    }

    fn add_skin(&mut self, skin: &gltf::Skin, buffers: &[gltf::buffer::Data], node_names: &[String]) {
        let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
        let joint_nodes: HashSet<usize> = joints.iter().copied().collect();

        let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
        let inverse_binds: Vec<Mat4> = reader
            .read_inverse_bind_matrices()
            .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
            .unwrap_or_default();

        let first = self.bones.len();
        let mut bone_of_node = HashMap::new();
        for (i, &node) in joints.iter().enumerate() {
            let bind = match inverse_binds.get(i) {
                Some(ibm) => ibm.inverse(),
                None => self.rest_global(node),
            };
            bone_of_node.insert(node, first + i);
            self.bones.push(Bone {
                name: node_names[node].clone(),
                node,
                parent: None,
                children: Vec::new(),
                bind,
            });
        }

        // Parent is the nearest ancestor node that is also a joint of this skin
        for i in first..self.bones.len() {
            let mut cursor = self.nodes[self.bones[i].node].parent;
            while let Some(n) = cursor {
                if let Some(&p) = bone_of_node.get(&n) {
                    self.bones[i].parent = Some(p);
                    self.bones[p].children.push(i);
                    break;
                }
                cursor = self.nodes[n].parent;
            }
        }

        let bones: Vec<usize> = (first..self.bones.len()).collect();
        let roots = bones
            .iter()
            .copied()
            .filter(|&b| self.bones[b].parent.is_none())
            .collect();
        let name = skin
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("skin_{}", skin.index()));

        self.armatures.push(Armature {
            name,
            bones,
            roots,
            joint_nodes,
        });
    }

    fn local_at(&self, node: usize, animation: Option<&Animation>, time: f32) -> Mat4 {
        let rest = &self.nodes[node];
        let (mut t, mut r, mut s) = (rest.translation, rest.rotation, rest.scale);
        if let Some(tracks) = animation.and_then(|a| a.tracks.get(&node)) {
            if let Some(c) = &tracks.translation {
                t = interpolate_vec3(&c.times, &c.values, time, c.interpolation).unwrap_or(t);
            }
            if let Some(c) = &tracks.rotation {
                r = interpolate_quat(&c.times, &c.values, time, c.interpolation).unwrap_or(r);
            }
            if let Some(c) = &tracks.scale {
                s = interpolate_vec3(&c.times, &c.values, time, c.interpolation).unwrap_or(s);
            }
        }
        Mat4::from_scale_rotation_translation(s, r, t)
    }

    fn global_at(&self, node: usize, animation: Option<&Animation>, time: f32) -> Mat4 {
        let mut matrix = self.local_at(node, animation, time);
        let mut cursor = self.nodes[node].parent;
        while let Some(n) = cursor {
            matrix = self.local_at(n, animation, time) * matrix;
            cursor = self.nodes[n].parent;
        }
        matrix
    }

    fn rest_global(&self, node: usize) -> Mat4 {
        self.global_at(node, None, 0.0)
    }

    fn targets_armature(&self, animation: &Animation, armature: usize) -> bool {
        let joints = &self.armatures[armature].joint_nodes;
        animation.tracks.keys().any(|n| joints.contains(n))
    }
}

fn read_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    joint_names: &[&str],
    armature: usize,
    name: String,
    diagnostics: &mut Diagnostics,
) -> Result<Mesh> {
    let mut materials: Vec<String> = Vec::new();
    let mut positions: Vec<Vec3> = Vec::new();
    let mut groups: Vec<Vec<(String, f32)>> = Vec::new();
    let mut polygons: Vec<Polygon> = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            diagnostics.warn(
                DiagnosticKind::UnsupportedPrimitive,
                &name,
                format!(
                    "skipping primitive {} with mode {:?}",
                    primitive.index(),
                    primitive.mode()
                ),
            );
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let offset = positions.len() as u32;

        let prim_positions: Vec<Vec3> = reader
            .read_positions()
            .with_context(|| format!("Mesh '{}': primitive without positions", name))?
            .map(Vec3::from)
            .collect();
        let count = prim_positions.len();

        let uvs: Option<Vec<[f32; 2]>> = reader
            .read_tex_coords(0)
            .map(|iter| iter.into_f32().collect());
        let joints: Option<Vec<[u16; 4]>> = reader.read_joints(0).map(|iter| iter.into_u16().collect());
        let weights: Option<Vec<[f32; 4]>> = reader.read_weights(0).map(|iter| iter.into_f32().collect());

        for i in 0..count {
            let mut memberships = Vec::new();
            if let (Some(j), Some(w)) = (&joints, &weights) {
                for k in 0..4 {
                    let weight = w.get(i).map_or(0.0, |w| w[k]);
                    let joint = j.get(i).map_or(0, |j| j[k]) as usize;
                    if weight > 0.0 {
                        if let Some(bone) = joint_names.get(joint) {
                            memberships.push((bone.to_string(), weight));
                        }
                    }
                }
            }
            groups.push(memberships);
        }
        positions.extend(prim_positions);

        let material = primitive.material();
        let material_name = match (material.name(), material.index()) {
            (Some(n), _) => n.to_string(),
            (None, Some(i)) => format!("material_{}", i),
            (None, None) => "default".to_string(),
        };
        let material_index = match materials.iter().position(|m| *m == material_name) {
            Some(i) => i,
            None => {
                materials.push(material_name);
                materials.len() - 1
            }
        };

        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..count as u32).collect(),
        };
        for tri in indices.chunks_exact(3) {
            let loop_uvs = uvs.as_ref().map(|uvs| {
                tri.iter()
                    .map(|&i| uvs.get(i as usize).copied().unwrap_or([0.0, 0.0]))
                    .collect()
            });
            polygons.push(Polygon {
                vertex_indices: tri.iter().map(|&i| i + offset).collect(),
                material_index,
                uvs: loop_uvs,
            });
        }
    }

    Ok(Mesh {
        name,
        armature,
        materials,
        positions,
        groups,
        polygons,
    })
}

fn read_animation(animation: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> Result<Animation> {
    use gltf::animation::util::ReadOutputs;

    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));
    let mut tracks: HashMap<usize, NodeTracks> = HashMap::new();
    let mut duration = 0.0f32;

    for channel in animation.channels() {
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let times: Vec<f32> = reader
            .read_inputs()
            .with_context(|| format!("Animation '{}': channel without inputs", name))?
            .collect();
        if let Some(&t) = times.last() {
            duration = duration.max(t);
        }

        let (interpolation, cubic) = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
            gltf::animation::Interpolation::Step => (Interpolation::Step, false),
            // Keep only the value of each (in-tangent, value, out-tangent) triple
            gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
        };
        let keep = |i: usize| !cubic || i % 3 == 1;

        let node = channel.target().node().index();
        let entry = tracks.entry(node).or_default();
        match reader.read_outputs() {
            Some(ReadOutputs::Translations(iter)) => {
                entry.translation = Some(Channel {
                    interpolation,
                    times: times.clone(),
                    values: iter.enumerate().filter(|(i, _)| keep(*i)).map(|(_, v)| Vec3::from(v)).collect(),
                });
            }
            Some(ReadOutputs::Rotations(rotations)) => {
                entry.rotation = Some(Channel {
                    interpolation,
                    times: times.clone(),
                    values: rotations
                        .into_f32()
                        .enumerate()
                        .filter(|(i, _)| keep(*i))
                        .map(|(_, q)| Quat::from_array(q).normalize())
                        .collect(),
                });
            }
            Some(ReadOutputs::Scales(iter)) => {
                entry.scale = Some(Channel {
                    interpolation,
                    times: times.clone(),
                    values: iter.enumerate().filter(|(i, _)| keep(*i)).map(|(_, v)| Vec3::from(v)).collect(),
                });
            }
            _ => {} // Morph target weights do not affect bones
        }
    }

    Ok(Animation {
        name,
        duration,
        tracks,
    })
}

impl SceneAdapter for GltfScene {
    fn armatures(&self) -> Vec<ArmatureRef> {
        (0..self.armatures.len()).map(ArmatureRef).collect()
    }

    fn armature_name(&self, armature: ArmatureRef) -> &str {
        &self.armatures[armature.0].name
    }

    fn armature_world_transform(&self, _armature: ArmatureRef) -> Mat4 {
        // Joint matrices are already global
        Mat4::IDENTITY
    }

    fn list_root_bones(&self, armature: ArmatureRef) -> Vec<BoneRef> {
        self.armatures[armature.0].roots.iter().copied().map(BoneRef).collect()
    }

    fn list_bones(&self, armature: ArmatureRef) -> Vec<BoneRef> {
        self.armatures[armature.0].bones.iter().copied().map(BoneRef).collect()
    }

    fn find_bone(&self, armature: ArmatureRef, name: &str) -> Option<BoneRef> {
        self.armatures[armature.0]
            .bones
            .iter()
            .copied()
            .find(|&b| self.bones[b].name == name)
            .map(BoneRef)
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
        self.bones[bone.0].bind
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

    fn mesh_world_transform(&self, _mesh: MeshRef) -> Mat4 {
        // Skinned vertices live in bind space; the node transform is ignored
        Mat4::IDENTITY
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
        self.animations
            .iter()
            .enumerate()
            .filter(|(_, a)| self.targets_armature(a, armature.0))
            .map(|(i, _)| ActionRef(i))
            .collect()
    }

    fn action_name(&self, action: ActionRef) -> &str {
        &self.animations[action.0].name
    }

    fn animation_frame_range(&self, action: ActionRef) -> (i32, i32) {
        let duration = self.animations[action.0].duration;
        (0, (duration * self.frame_rate as f32).round() as i32)
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn pose_at(&self, armature: ArmatureRef, action: ActionRef, bone: &str, frame: i32) -> Option<Mat4> {
        let bone = self.find_bone(armature, bone)?;
        let animation = self.animations.get(action.0)?;
        let time = frame as f32 / self.frame_rate as f32;
        Some(self.global_at(self.bones[bone.0].node, Some(animation), time))
    }

    fn animates_bone(&self, armature: ArmatureRef, action: ActionRef, bone: &str) -> bool {
        let Some(bone) = self.find_bone(armature, bone) else {
            return false;
        };
        self.animations
            .get(action.0)
            .is_some_and(|a| a.tracks.contains_key(&self.bones[bone.0].node))
    }

    fn load_diagnostics(&self) -> Diagnostics {
        self.diagnostics.clone()
    }
}
