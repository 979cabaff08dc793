//! MD5 mesh text format (.md5mesh)
//!
//! # Layout
//! ```text
//! MD5Version 10
//! commandline "<string>"
//!
//! numJoints <N>
//! numMeshes <M>
//!
//! joints {
//!     "<name>" <parent> ( <px> <py> <pz> ) ( <qx> <qy> <qz> )
//! }
//!
//! mesh {
//!     shader "<material>"
//!
//!     numverts <V>
//!     vert <i> ( <u> <v> ) <weight_start> <weight_count>
//!
//!     numtris <T>
//!     tri <i> <v0> <v1> <v2>
//!
//!     numweights <W>
//!     weight <i> <joint> <bias> ( <x> <y> <z> )
//! }
//! ```
//!
//! Joint positions are root-space bind translations. Weight positions are
//! expressed in the owning joint's bind space.

use std::fmt;

use glam::{Mat4, Vec3};

use super::{Float, Float3, WriteOptions, escape_quoted, write_preamble};
use crate::math::{decompose, hemisphere_xyz};

/// A skeleton joint in bind pose
#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    /// Pre-order depth-first index, always greater than the parent's
    pub id: u32,
    pub name: String,
    /// Parent joint id, `None` for roots
    pub parent: Option<u32>,
    /// Root-space transform at bind time (not parent-relative)
    pub bind_matrix: Mat4,
}

impl Joint {
    /// Parent index as written to file (-1 for roots)
    pub fn parent_index(&self) -> i32 {
        self.parent.map_or(-1, |p| p as i32)
    }
}

/// A vertex of one submesh
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub id: u32,
    /// Texture coordinate, `None` when the source polygon has no UV layer
    pub uv: Option<[f32; 2]>,
    /// First index into the submesh's weight list
    pub weight_start: u32,
    pub weight_count: u32,
}

/// Triangle in file winding order (already reversed from the authoring polygon)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Triangle(pub [u32; 3]);

/// A joint influence on a vertex
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Weight {
    pub id: u32,
    pub joint_id: u32,
    pub bias: f32,
    /// Vertex position in the joint's bind space
    pub position: Vec3,
}

/// Material-homogeneous partition of a mesh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubMesh {
    pub material: String,
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
    pub weights: Vec<Weight>,
}

impl SubMesh {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            ..Default::default()
        }
    }

    /// Weights belonging to `vertex`
    pub fn vertex_weights(&self, vertex: &Vertex) -> &[Weight] {
        let start = vertex.weight_start as usize;
        let end = start + vertex.weight_count as usize;
        self.weights.get(start..end).unwrap_or(&[])
    }
}

/// Write a complete `.md5mesh` document
///
/// `joints` must be in id order.
pub fn write_md5mesh<W: fmt::Write>(
    w: &mut W,
    options: &WriteOptions<'_>,
    joints: &[Joint],
    meshes: &[SubMesh],
) -> fmt::Result {
    write_preamble(w, options)?;
    writeln!(w, "numJoints {}", joints.len())?;
    writeln!(w, "numMeshes {}", meshes.len())?;
    writeln!(w)?;

    writeln!(w, "joints {{")?;
    for joint in joints {
        let (translation, rotation) = decompose(&joint.bind_matrix);
        writeln!(
            w,
            "\t\"{}\" {} ( {} ) ( {} )",
            escape_quoted(&joint.name),
            joint.parent_index(),
            Float3((translation * options.scale).to_array()),
            Float3(hemisphere_xyz(rotation).to_array()),
        )?;
    }
    writeln!(w, "}}")?;
    writeln!(w)?;

    for mesh in meshes {
        write_submesh(w, options, mesh)?;
        writeln!(w)?;
    }

    Ok(())
}

fn write_submesh<W: fmt::Write>(
    w: &mut W,
    options: &WriteOptions<'_>,
    mesh: &SubMesh,
) -> fmt::Result {
    writeln!(w, "mesh {{")?;
    writeln!(w, "\tshader \"{}\"", escape_quoted(&mesh.material))?;
    writeln!(w)?;

    writeln!(w, "\tnumverts {}", mesh.vertices.len())?;
    for (i, vert) in mesh.vertices.iter().enumerate() {
        let [u, v] = vert.uv.unwrap_or([0.0, 0.0]);
        writeln!(
            w,
            "\tvert {} ( {} {} ) {} {}",
            i,
            Float(u),
            Float(v),
            vert.weight_start,
            vert.weight_count
        )?;
    }
    writeln!(w)?;

    writeln!(w, "\tnumtris {}", mesh.triangles.len())?;
    for (i, Triangle([a, b, c])) in mesh.triangles.iter().enumerate() {
        writeln!(w, "\ttri {} {} {} {}", i, a, b, c)?;
    }
    writeln!(w)?;

    writeln!(w, "\tnumweights {}", mesh.weights.len())?;
    for (i, weight) in mesh.weights.iter().enumerate() {
        writeln!(
            w,
            "\tweight {} {} {} ( {} )",
            i,
            weight.joint_id,
            Float(weight.bias),
            Float3((weight.position * options.scale).to_array()),
        )?;
    }
    writeln!(w, "}}")
}

/// Render a `.md5mesh` document to a string
pub fn md5mesh_to_string(options: &WriteOptions<'_>, joints: &[Joint], meshes: &[SubMesh]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_md5mesh(&mut out, options, joints, meshes);
    out
}
