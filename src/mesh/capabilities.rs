//! Per-mesh attribute capability set.

use crate::document::{VertexAttrib, MAX_UV_CHANNELS};
use crate::scene::MeshData;

/// Which optional vertex channels a mesh carries.
///
/// Computed once per source mesh and shared by all of its material parts,
/// so parts of one mesh always expose the same arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    const COLOR: u32 = 1 << 0;
    const SKIN: u32 = 1 << 1;
    const UV_SHIFT: u32 = 8;
    const TANGENT_SHIFT: u32 = 16;

    /// Detect the channels of `mesh`.
    pub fn detect(mesh: &MeshData, export_tangents: bool, skinned: bool) -> Self {
        let mut caps = Self::default();
        if mesh.colors.as_ref().is_some_and(|c| !c.is_empty()) {
            caps.0 |= Self::COLOR;
        }
        for ch in 0..mesh.uv_layers.len().min(MAX_UV_CHANNELS) as u8 {
            caps.0 |= 1 << (Self::UV_SHIFT + ch as u32);
            if export_tangents {
                caps.0 |= 1 << (Self::TANGENT_SHIFT + ch as u32);
            }
        }
        if skinned {
            caps.0 |= Self::SKIN;
        }
        caps
    }

    #[inline]
    pub fn has_color(self) -> bool {
        self.0 & Self::COLOR != 0
    }

    #[inline]
    pub fn has_skin(self) -> bool {
        self.0 & Self::SKIN != 0
    }

    #[inline]
    pub fn has_uv(self, ch: u8) -> bool {
        (ch as usize) < MAX_UV_CHANNELS && self.0 & (1 << (Self::UV_SHIFT + ch as u32)) != 0
    }

    #[inline]
    pub fn has_tangent(self, ch: u8) -> bool {
        (ch as usize) < MAX_UV_CHANNELS && self.0 & (1 << (Self::TANGENT_SHIFT + ch as u32)) != 0
    }

    /// Number of UV channels (channels are always contiguous from 0).
    pub fn uv_count(self) -> usize {
        (0..MAX_UV_CHANNELS as u8).take_while(|&ch| self.has_uv(ch)).count()
    }

    /// Vertex arrays to allocate, in output order.
    pub fn attribs(self) -> Vec<VertexAttrib> {
        let mut out = vec![VertexAttrib::Position, VertexAttrib::Normal];
        if self.has_color() {
            out.push(VertexAttrib::Color);
        }
        for ch in 0..self.uv_count() as u8 {
            out.push(VertexAttrib::Texcoord(ch));
        }
        for ch in 0..self.uv_count() as u8 {
            if self.has_tangent(ch) {
                out.push(VertexAttrib::Tangent(ch));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::UvLayer;

    #[test]
    fn test_plain_mesh() {
        let caps = Capabilities::detect(&MeshData::default(), true, false);
        assert!(!caps.has_color());
        assert_eq!(caps.uv_count(), 0);
        assert!(!caps.has_tangent(0));
        assert_eq!(caps.attribs(), vec![VertexAttrib::Position, VertexAttrib::Normal]);
    }

    #[test]
    fn test_uv_channels_capped() {
        let mesh = MeshData {
            uv_layers: (0..10)
                .map(|i| UvLayer { name: format!("uv{}", i), uvs: Vec::new() })
                .collect(),
            ..Default::default()
        };
        let caps = Capabilities::detect(&mesh, true, true);
        assert_eq!(caps.uv_count(), MAX_UV_CHANNELS);
        assert!(caps.has_tangent(7));
        assert!(!caps.has_uv(8));
        assert!(caps.has_skin());

        let attribs = caps.attribs();
        assert_eq!(attribs.len(), 2 + 2 * MAX_UV_CHANNELS);
        assert_eq!(attribs[2], VertexAttrib::Texcoord(0));
        assert_eq!(attribs[2 + MAX_UV_CHANNELS], VertexAttrib::Tangent(0));
    }

    #[test]
    fn test_tangents_need_flag() {
        let mesh = MeshData {
            uv_layers: vec![UvLayer::default()],
            colors: Some(Vec::new()),
            ..Default::default()
        };
        let caps = Capabilities::detect(&mesh, false, false);
        assert!(caps.has_uv(0));
        assert!(!caps.has_tangent(0));
        assert!(!caps.has_color());
    }
}
