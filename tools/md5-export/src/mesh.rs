//! Mesh builder (scene mesh -> MD5 submeshes)
//!
//! Polygons are partitioned by material. Within a submesh, loops that hit the
//! same source vertex with the same UV share one MD5 vertex; a differing UV
//! clones the vertex with the same influences. Weights are rebuilt at the end
//! so each submesh's weight ids are contiguous and in vertex order.

use glam::Vec3;
use hashbrown::{HashMap, HashSet};
use md5_common::{SubMesh, Triangle, Vertex, Weight};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{ExportError, Result};
use crate::scene::{MeshRef, Polygon, SceneAdapter};
use crate::skeleton::Skeleton;

/// A resolved joint influence in bind space
#[derive(Clone, Copy, Debug, PartialEq)]
struct Influence {
    joint_id: u32,
    bias: f32,
    position: Vec3,
}

#[derive(Debug)]
struct PendingVertex {
    uv: Option<[f32; 2]>,
    source: u32,
}

/// Accumulates one material's vertices and triangles
#[derive(Debug)]
struct SubMeshBuilder {
    material: String,
    vertices: Vec<PendingVertex>,
    by_source: HashMap<u32, Vec<u32>>,
    triangles: Vec<Triangle>,
    faces: HashSet<[u32; 3]>,
}

impl SubMeshBuilder {
    fn new(material: String) -> Self {
        Self {
            material,
            vertices: Vec::new(),
            by_source: HashMap::new(),
            triangles: Vec::new(),
            faces: HashSet::new(),
        }
    }

    /// Vertex id for a loop, reusing an existing vertex when source and UV match
    fn resolve(&mut self, source: u32, uv: Option<[f32; 2]>) -> u32 {
        let ids = self.by_source.entry(source).or_default();
        if let Some(&id) = ids.iter().find(|&&id| self.vertices[id as usize].uv == uv) {
            return id;
        }
        let id = self.vertices.len() as u32;
        self.vertices.push(PendingVertex { uv, source });
        ids.push(id);
        id
    }

    /// Fan-triangulate from the first loop, emitting reversed winding
    fn add_polygon(&mut self, ids: &[u32], mesh_name: &str, diagnostics: &mut Diagnostics) {
        for i in 1..ids.len() - 1 {
            let triangle = Triangle([ids[0], ids[i + 1], ids[i]]);
            let mut key = triangle.0;
            key.sort_unstable();
            if !self.faces.insert(key) {
                diagnostics.warn(
                    DiagnosticKind::DoubleFace,
                    mesh_name,
                    format!(
                        "material '{}': triangle {:?} reuses the vertices of an earlier triangle",
                        self.material, triangle.0
                    ),
                );
            }
            self.triangles.push(triangle);
        }
    }

    /// Assign weight ranges in vertex order
    fn finish(self, influences: &HashMap<u32, Vec<Influence>>) -> SubMesh {
        let mut submesh = SubMesh::new(self.material);
        for (id, pending) in self.vertices.iter().enumerate() {
            let weight_start = submesh.weights.len() as u32;
            let vertex_influences = influences.get(&pending.source).map_or(&[][..], Vec::as_slice);
            for influence in vertex_influences {
                submesh.weights.push(Weight {
                    id: submesh.weights.len() as u32,
                    joint_id: influence.joint_id,
                    bias: influence.bias,
                    position: influence.position,
                });
            }
            submesh.vertices.push(Vertex {
                id: id as u32,
                uv: pending.uv,
                weight_start,
                weight_count: vertex_influences.len() as u32,
            });
        }
        submesh.triangles = self.triangles;
        submesh
    }
}

/// Why a polygon cannot be triangulated
fn degenerate_reason(polygon: &Polygon, vertex_count: usize) -> Option<String> {
    let indices = &polygon.vertex_indices;
    if indices.len() < 3 {
        return Some(format!("only {} vertices", indices.len()));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Some(format!("vertex index {} out of range", bad));
    }
    let mut seen = HashSet::with_capacity(indices.len());
    if let Some(&dup) = indices.iter().find(|&&i| !seen.insert(i)) {
        return Some(format!("vertex {} used twice", dup));
    }
    None
}

/// Resolve a source vertex's groups into normalized bind-space influences
fn compute_influences<A: SceneAdapter + ?Sized>(
    scene: &A,
    skeleton: &Skeleton,
    mesh: MeshRef,
    index: u32,
    world: Vec3,
    unknown_bones: &mut HashSet<String>,
    diagnostics: &mut Diagnostics,
) -> Vec<Influence> {
    let mesh_name = scene.mesh_name(mesh);
    let mut resolved: Vec<(u32, f32)> = Vec::new();
    for (bone, weight) in scene.vertex_groups(mesh, index) {
        match skeleton.find(&bone) {
            Some(joint) => resolved.push((joint.id, weight)),
            None => {
                if unknown_bones.insert(bone.clone()) {
                    diagnostics.warn(
                        DiagnosticKind::UnknownBone,
                        mesh_name,
                        format!("vertex group '{}' has no joint in the skeleton, ignoring it", bone),
                    );
                }
            }
        }
    }

    let total: f32 = resolved.iter().map(|(_, w)| w).sum();
    let scale = if total > 0.0 {
        1.0 / total
    } else {
        diagnostics.warn(
            DiagnosticKind::UnskinnedVertex,
            mesh_name,
            format!("vertex {} has no bone influence", index),
        );
        1.0
    };

    resolved
        .into_iter()
        .map(|(joint_id, weight)| Influence {
            joint_id,
            bias: weight * scale,
            position: skeleton.to_bind_space(joint_id, world),
        })
        .collect()
}

/// Build one submesh per material used by `mesh`, in first-use order
///
/// A mesh with no vertices yields no submeshes. A mesh with no material slots
/// is a structural error.
pub fn build_submeshes<A: SceneAdapter + ?Sized>(
    scene: &A,
    skeleton: &Skeleton,
    mesh: MeshRef,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<SubMesh>> {
    let mesh_name = scene.mesh_name(mesh).to_string();
    let positions = scene.mesh_positions(mesh);
    if positions.is_empty() {
        tracing::debug!("Mesh '{}' has no vertices", mesh_name);
        return Ok(Vec::new());
    }

    let materials = scene.mesh_materials(mesh);
    if materials.is_empty() {
        return Err(ExportError::NoMaterials(mesh_name));
    }
    let mesh_world = scene.mesh_world_transform(mesh);

    let mut builders: Vec<SubMeshBuilder> = Vec::new();
    let mut slot_to_builder: HashMap<usize, usize> = HashMap::new();
    let mut influences: HashMap<u32, Vec<Influence>> = HashMap::new();
    let mut unknown_bones: HashSet<String> = HashSet::new();

    for (polygon_index, polygon) in scene.mesh_polygons(mesh).iter().enumerate() {
        if let Some(reason) = degenerate_reason(polygon, positions.len()) {
            diagnostics.warn(
                DiagnosticKind::DegeneratePolygon,
                &mesh_name,
                format!("dropping polygon {}: {}", polygon_index, reason),
            );
            continue;
        }

        let mut slot = polygon.material_index;
        if slot >= materials.len() {
            diagnostics.warn(
                DiagnosticKind::InvalidMaterial,
                &mesh_name,
                format!(
                    "polygon {} uses material slot {} of {}, using slot 0",
                    polygon_index,
                    slot,
                    materials.len()
                ),
            );
            slot = 0;
        }
        let builder_index = *slot_to_builder.entry(slot).or_insert_with(|| {
            builders.push(SubMeshBuilder::new(materials[slot].clone()));
            builders.len() - 1
        });

        let mut ids = Vec::with_capacity(polygon.vertex_indices.len());
        for (loop_index, &source) in polygon.vertex_indices.iter().enumerate() {
            let uv = polygon.uvs.as_ref().and_then(|uvs| uvs.get(loop_index).copied());
            if !influences.contains_key(&source) {
                let world = mesh_world.transform_point3(positions[source as usize]);
                let resolved = compute_influences(
                    scene,
                    skeleton,
                    mesh,
                    source,
                    world,
                    &mut unknown_bones,
                    diagnostics,
                );
                influences.insert(source, resolved);
            }
            ids.push(builders[builder_index].resolve(source, uv));
        }
        builders[builder_index].add_polygon(&ids, &mesh_name, diagnostics);
    }

    let submeshes: Vec<SubMesh> = builders.into_iter().map(|b| b.finish(&influences)).collect();
    tracing::debug!(
        "Mesh '{}': {} submeshes, {} vertices, {} triangles",
        mesh_name,
        submeshes.len(),
        submeshes.iter().map(|s| s.vertices.len()).sum::<usize>(),
        submeshes.iter().map(|s| s.triangles.len()).sum::<usize>()
    );
    Ok(submeshes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneDocument;
    use crate::skeleton::build_skeleton;

    fn scene_with(mesh: serde_json::Value) -> SceneDocument {
        let json = serde_json::json!({
            "armatures": [{
                "name": "Rig",
                "bones": [
                    { "name": "root" },
                    { "name": "arm", "parent": "root", "rest": { "translation": [2, 0, 0] } }
                ]
            }],
            "meshes": [mesh]
        });
        SceneDocument::from_json(&json.to_string()).unwrap()
    }

    fn build(scene: &SceneDocument) -> (Result<Vec<SubMesh>>, Diagnostics) {
        let armature = scene.armatures()[0];
        let mut diagnostics = Diagnostics::new();
        let skeleton = build_skeleton(scene, armature, &mut diagnostics).unwrap();
        let mesh = scene.meshes(armature)[0];
        (build_submeshes(scene, &skeleton, mesh, &mut diagnostics), diagnostics)
    }

    fn quad(uvs: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "name": "Quad",
            "armature": "Rig",
            "materials": ["mat"],
            "vertices": [
                { "position": [0, 0, 0], "groups": [["root", 1.0]] },
                { "position": [1, 0, 0], "groups": [["root", 1.0]] },
                { "position": [1, 1, 0], "groups": [["root", 1.0]] },
                { "position": [0, 1, 0], "groups": [["root", 1.0]] }
            ],
            "polygons": [{ "vertices": [0, 1, 2, 3], "uvs": uvs }]
        })
    }

    #[test]
    fn test_quad_fan_triangulation_reversed() {
        let scene = scene_with(quad(serde_json::json!([[0, 0], [1, 0], [1, 1], [0, 1]])));
        let (submeshes, diagnostics) = build(&scene);
        let submeshes = submeshes.unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(submeshes.len(), 1);
        assert_eq!(
            submeshes[0].triangles,
            vec![Triangle([0, 2, 1]), Triangle([0, 3, 2])]
        );
    }

    #[test]
    fn test_shared_vertex_same_uv_collapses() {
        let mut mesh = quad(serde_json::Value::Null);
        mesh["polygons"] = serde_json::json!([
            { "vertices": [0, 1, 2], "uvs": [[0, 0], [1, 0], [1, 1]] },
            { "vertices": [0, 2, 3], "uvs": [[0, 0], [1, 1], [0, 1]] }
        ]);
        let scene = scene_with(mesh);
        let (submeshes, _) = build(&scene);
        assert_eq!(submeshes.unwrap()[0].vertices.len(), 4);
    }

    #[test]
    fn test_shared_vertex_different_uv_clones() {
        let mut mesh = quad(serde_json::Value::Null);
        mesh["polygons"] = serde_json::json!([
            { "vertices": [0, 1, 2], "uvs": [[0, 0], [1, 0], [1, 1]] },
            { "vertices": [0, 2, 3], "uvs": [[0.5, 0.5], [1, 1], [0, 1]] }
        ]);
        let scene = scene_with(mesh);
        let (submeshes, _) = build(&scene);
        let submesh = &submeshes.unwrap()[0];
        assert_eq!(submesh.vertices.len(), 5);

        // Clone carries the same influences under a new id
        let original = submesh.vertex_weights(&submesh.vertices[0]);
        let clone = submesh.vertex_weights(&submesh.vertices[3]);
        assert_eq!(original.len(), clone.len());
        assert_eq!(original[0].joint_id, clone[0].joint_id);
        assert_eq!(original[0].position, clone[0].position);
        assert_ne!(original[0].id, clone[0].id);
    }

    #[test]
    fn test_weights_normalized_and_in_bind_space() {
        let scene = scene_with(serde_json::json!({
            "name": "Arm",
            "armature": "Rig",
            "materials": ["mat"],
            "vertices": [
                { "position": [3, 0, 0], "groups": [["root", 2.0], ["arm", 6.0]] },
                { "position": [4, 0, 0], "groups": [["arm", 1.0]] },
                { "position": [4, 1, 0], "groups": [["arm", 1.0]] }
            ],
            "polygons": [{ "vertices": [0, 1, 2] }]
        }));
        let (submeshes, _) = build(&scene);
        let submesh = &submeshes.unwrap()[0];

        let weights = submesh.vertex_weights(&submesh.vertices[0]);
        assert_eq!(weights.len(), 2);
        assert!((weights[0].bias - 0.25).abs() < 1e-6);
        assert!((weights[1].bias - 0.75).abs() < 1e-6);
        assert!(weights[1].position.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));

        // Contiguous ids in vertex order
        for (i, weight) in submesh.weights.iter().enumerate() {
            assert_eq!(weight.id as usize, i);
        }
        assert_eq!(submesh.vertices[1].weight_start, 2);
        assert_eq!(submesh.vertices[2].weight_start, 3);
        assert_eq!(submesh.vertices[0].uv, None);
    }

    #[test]
    fn test_unskinned_vertex_passes_through() {
        let scene = scene_with(serde_json::json!({
            "name": "Loose",
            "armature": "Rig",
            "materials": ["mat"],
            "vertices": [
                { "position": [0, 0, 0], "groups": [["ghost", 0.5]] },
                { "position": [1, 0, 0] },
                { "position": [0, 1, 0], "groups": [["root", 0.5]] }
            ],
            "polygons": [{ "vertices": [0, 1, 2] }]
        }));
        let (submeshes, diagnostics) = build(&scene);
        let submesh = &submeshes.unwrap()[0];
        assert_eq!(diagnostics.count(DiagnosticKind::UnknownBone), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::UnskinnedVertex), 2);
        assert_eq!(submesh.vertices[0].weight_count, 0);
        assert_eq!(submesh.vertex_weights(&submesh.vertices[2])[0].bias, 1.0);
    }

    #[test]
    fn test_degenerate_polygons_dropped() {
        let mut mesh = quad(serde_json::Value::Null);
        mesh["polygons"] = serde_json::json!([
            { "vertices": [0, 1] },
            { "vertices": [0, 1, 1] },
            { "vertices": [0, 1, 9] },
            { "vertices": [0, 1, 2] }
        ]);
        let scene = scene_with(mesh);
        let (submeshes, diagnostics) = build(&scene);
        assert_eq!(diagnostics.count(DiagnosticKind::DegeneratePolygon), 3);
        assert_eq!(submeshes.unwrap()[0].triangles.len(), 1);
    }

    #[test]
    fn test_submeshes_follow_material_first_use() {
        let mut mesh = quad(serde_json::Value::Null);
        mesh["materials"] = serde_json::json!(["a", "b"]);
        mesh["polygons"] = serde_json::json!([
            { "vertices": [0, 1, 2], "material": 1 },
            { "vertices": [0, 2, 3], "material": 0 },
            { "vertices": [1, 2, 3], "material": 7 }
        ]);
        let scene = scene_with(mesh);
        let (submeshes, diagnostics) = build(&scene);
        let submeshes = submeshes.unwrap();
        let names: Vec<&str> = submeshes.iter().map(|s| s.material.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(submeshes[1].triangles.len(), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::InvalidMaterial), 1);
    }

    #[test]
    fn test_double_face_detected() {
        let mut mesh = quad(serde_json::Value::Null);
        mesh["polygons"] = serde_json::json!([
            { "vertices": [0, 1, 2] },
            { "vertices": [2, 1, 0] }
        ]);
        let scene = scene_with(mesh);
        let (submeshes, diagnostics) = build(&scene);
        assert_eq!(diagnostics.count(DiagnosticKind::DoubleFace), 1);
        assert_eq!(submeshes.unwrap()[0].triangles.len(), 2);
    }

    #[test]
    fn test_no_materials_is_structural_error() {
        let mut mesh = quad(serde_json::Value::Null);
        mesh["materials"] = serde_json::json!([]);
        let scene = scene_with(mesh);
        let (submeshes, _) = build(&scene);
        assert!(matches!(submeshes, Err(ExportError::NoMaterials(name)) if name == "Quad"));
    }

    #[test]
    fn test_empty_mesh_skipped_before_material_check() {
        let scene = scene_with(serde_json::json!({
            "name": "Helper",
            "armature": "Rig",
            "materials": []
        }));
        let (submeshes, diagnostics) = build(&scene);
        assert!(submeshes.unwrap().is_empty());
        assert!(diagnostics.is_empty());
    }
}
