//! Non-fatal export warnings
//!
//! Builders push every data problem here instead of printing it, so callers
//! can inspect what was skipped. Each entry is also logged as it is recorded.

use std::fmt;

/// Category of a data warning
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Polygon with fewer than 3 distinct vertices or an out-of-range index
    DegeneratePolygon,
    /// Polygon material slot out of range
    InvalidMaterial,
    /// Vertex without usable bone influences
    UnskinnedVertex,
    /// Bone referenced by a vertex group or pose but absent from the skeleton
    UnknownBone,
    /// Pose query returned nothing for a joint at some frame
    MissingPose,
    /// Two triangles of one submesh share the same vertex set
    DoubleFace,
    /// Two bones of one skeleton share a name
    DuplicateBone,
    /// Animation output skipped because the armature has no action
    NoAction,
    /// Source geometry the exporter cannot triangulate (points, lines, strips)
    UnsupportedPrimitive,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DegeneratePolygon => "degenerate polygon",
            Self::InvalidMaterial => "invalid material",
            Self::UnskinnedVertex => "unskinned vertex",
            Self::UnknownBone => "unknown bone",
            Self::MissingPose => "missing pose",
            Self::DoubleFace => "double face",
            Self::DuplicateBone => "duplicate bone",
            Self::NoAction => "no action",
            Self::UnsupportedPrimitive => "unsupported primitive",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Element the warning is about (mesh, bone or action name)
    pub context: String,
}

/// Ordered warning sink for one export unit
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a warning
    pub fn warn(
        &mut self,
        kind: DiagnosticKind,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        let entry = Diagnostic {
            kind,
            message: message.into(),
            context: context.into(),
        };
        tracing::warn!("[{}] {}: {}", entry.kind, entry.context, entry.message);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of warnings of one kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Append another sink's entries, keeping order
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }
}
