//! Export errors
//!
//! Structural problems abort one export unit; data problems never reach this
//! type and are recorded in [`crate::diagnostics::Diagnostics`] instead.

use std::path::PathBuf;

/// Errors that abort a single export unit
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Scene contains no armature at all
    #[error("no armature found in scene")]
    NoArmature,

    /// Requested armature does not exist
    #[error("armature '{0}' not found in scene")]
    UnknownArmature(String),

    /// Armature has no bones reachable from a root
    #[error("armature '{0}' has no exportable bones")]
    EmptySkeleton(String),

    /// Mesh output requested but no mesh is bound to the armature
    #[error("no meshes bound to armature '{0}'")]
    NoMeshes(String),

    /// Requested mesh does not exist or is not bound to the armature
    #[error("mesh '{0}' not found for armature")]
    UnknownMesh(String),

    /// Mesh has no material slots to name submeshes with
    #[error("mesh '{0}' has no materials")]
    NoMaterials(String),

    /// Animation output requested but the armature has no action
    #[error("no action found for armature '{0}'")]
    NoAction(String),

    /// Requested action does not exist
    #[error("action '{0}' not found for armature")]
    UnknownAction(String),

    /// Action frame range is empty (last < first)
    #[error("action '{name}' has an empty frame range [{first}, {last}]")]
    EmptyFrameRange { name: String, first: i32, last: i32 },

    /// Scene file could not be loaded
    #[error("failed to load scene {path:?}")]
    Scene {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Output file could not be written
    #[error("failed to write {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Whether this error came from the destination rather than the scene data
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Message followed by every source, `outer: inner: root`
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
