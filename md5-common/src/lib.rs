//! Shared types and writers for the MD5 skeletal formats
//!
//! This crate is used by `md5-export` (the asset pipeline) and provides:
//!
//! # Modules
//!
//! - [`math`] - Bone-space helpers (decomposition, quaternion hemisphere rule, bounds)
//! - [`formats`] - The `.md5mesh` / `.md5anim` data model and text writers

pub mod formats;
pub mod math;

pub use formats::{
    // Constants
    ALL_CHANNELS,
    COMPONENTS_PER_JOINT,
    DEFAULT_COMMANDLINE,
    MD5_ANIM_EXT,
    MD5_MESH_EXT,
    MD5_VERSION,
    // Animation types
    AnimationTrack,
    Bounds,
    Frame,
    JointAnimEntry,
    JointPose,
    // Mesh types
    Joint,
    SubMesh,
    Triangle,
    Vertex,
    Weight,
    WriteOptions,
    // Writers
    md5anim_to_string,
    md5mesh_to_string,
    write_md5anim,
    write_md5mesh,
};
pub use math::{Aabb, decompose, hemisphere_xyz, min_max};
