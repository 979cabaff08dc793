//! MD5 (idTech 4) text formats
//!
//! Two line-oriented text files make up one exported model:
//! - `.md5mesh`: joints in bind pose plus one `mesh` block per material
//! - `.md5anim`: joint hierarchy, per-frame bounds, baseframe and frame data
//!
//! Writers are pure: they never mutate the data model and produce identical
//! text for identical input. Every float is printed with 6 decimals.

pub mod md5anim;
pub mod md5mesh;

pub use md5anim::*;
pub use md5mesh::*;

use std::fmt;

/// Format version written in both file headers
pub const MD5_VERSION: u32 = 10;

/// Mesh file extension (without dot)
pub const MD5_MESH_EXT: &str = "md5mesh";

/// Animation file extension (without dot)
pub const MD5_ANIM_EXT: &str = "md5anim";

/// Default `commandline` header value
pub const DEFAULT_COMMANDLINE: &str = "md5-export";

/// Settings shared by both writers
#[derive(Clone, Copy, Debug)]
pub struct WriteOptions<'a> {
    /// Free-form string written to the `commandline` header line
    pub commandline: &'a str,
    /// Uniform scale applied to every positional value (never to UVs or rotations)
    pub scale: f32,
}

impl Default for WriteOptions<'_> {
    fn default() -> Self {
        Self {
            commandline: DEFAULT_COMMANDLINE,
            scale: 1.0,
        }
    }
}

/// `%f`-style float: 6 decimals, with an exact negative zero printed unsigned
#[derive(Clone, Copy)]
pub(crate) struct Float(pub f32);

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = if self.0 == 0.0 { 0.0 } else { self.0 };
        write!(f, "{:.6}", v)
    }
}

/// Three floats separated by single spaces
pub(crate) struct Float3(pub [f32; 3]);

impl fmt::Display for Float3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "{} {} {}", Float(x), Float(y), Float(z))
    }
}

/// Writes the two header lines common to both files
pub(crate) fn write_preamble<W: fmt::Write>(w: &mut W, options: &WriteOptions<'_>) -> fmt::Result {
    writeln!(w, "MD5Version {}", MD5_VERSION)?;
    writeln!(w, "commandline \"{}\"", escape_quoted(options.commandline))?;
    writeln!(w)
}

/// Quoted strings have no escape syntax in MD5, so embedded quotes are replaced
pub(crate) fn escape_quoted(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains('"') {
        s.replace('"', "'").into()
    } else {
        s.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_six_decimals() {
        assert_eq!(Float(1.0).to_string(), "1.000000");
        assert_eq!(Float(-0.25).to_string(), "-0.250000");
        assert_eq!(Float(1.0 / 3.0).to_string(), "0.333333");
    }

    #[test]
    fn test_float_negative_zero_unsigned() {
        assert_eq!(Float(-0.0).to_string(), "0.000000");
    }

    #[test]
    fn test_escape_quoted() {
        assert_eq!(escape_quoted("plain"), "plain");
        assert_eq!(escape_quoted("a \"b\""), "a 'b'");
    }
}
