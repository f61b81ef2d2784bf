//! Record codec: how each entity is laid out in a document body.
//!
//! Writing and reading of a type sit next to each other so the two sides
//! stay symmetric. All values are little-endian; strings are a `u32` byte
//! length followed by UTF-8; floats are `f32`.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::document::*;
use crate::util::{Error, Result};

/// Append-only body buffer.
#[derive(Default)]
pub struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    pub fn u8(&mut self, v: u8) -> Result<()> {
        self.buf.write_u8(v)?;
        Ok(())
    }

    #[inline]
    pub fn u32(&mut self, v: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(v)?;
        Ok(())
    }

    #[inline]
    pub fn i32(&mut self, v: i32) -> Result<()> {
        self.buf.write_i32::<LittleEndian>(v)?;
        Ok(())
    }

    #[inline]
    pub fn i64(&mut self, v: i64) -> Result<()> {
        self.buf.write_i64::<LittleEndian>(v)?;
        Ok(())
    }

    #[inline]
    pub fn f32(&mut self, v: f32) -> Result<()> {
        self.buf.write_f32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.u8(v as u8)
    }

    /// Element count as `u32`.
    pub fn len(&mut self, n: usize) -> Result<()> {
        let n = u32::try_from(n)
            .map_err(|_| Error::invalid(format!("collection of {} items is too large", n)))?;
        self.u32(n)
    }

    pub fn str(&mut self, s: &str) -> Result<()> {
        self.len(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn opt_str(&mut self, s: Option<&str>) -> Result<()> {
        match s {
            Some(s) => {
                self.u8(1)?;
                self.str(s)
            }
            None => self.u8(0),
        }
    }

    pub fn floats(&mut self, values: &[f32]) -> Result<()> {
        self.buf.reserve(4 + values.len() * 4);
        self.len(values.len())?;
        for &v in values {
            self.f32(v)?;
        }
        Ok(())
    }

    pub fn ints(&mut self, values: &[u32]) -> Result<()> {
        self.buf.reserve(4 + values.len() * 4);
        self.len(values.len())?;
        for &v in values {
            self.u32(v)?;
        }
        Ok(())
    }

    pub fn signed_ints(&mut self, values: &[i32]) -> Result<()> {
        self.buf.reserve(4 + values.len() * 4);
        self.len(values.len())?;
        for &v in values {
            self.i32(v)?;
        }
        Ok(())
    }

    pub fn fixed<const N: usize>(&mut self, values: &[f32; N]) -> Result<()> {
        for &v in values {
            self.f32(v)?;
        }
        Ok(())
    }

    pub fn seq<T: Record>(&mut self, items: &[T]) -> Result<()> {
        self.len(items.len())?;
        for item in items {
            item.write(self)?;
        }
        Ok(())
    }
}

/// Cursor over a decoded (uncompressed) body.
pub struct BodyReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BodyReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn eof(&self, e: io::Error) -> Error {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof(self.cursor.position())
        } else {
            Error::Io(e)
        }
    }

    /// Fail early when `count` elements of `size` bytes cannot fit.
    fn ensure(&self, count: usize, size: usize) -> Result<()> {
        match count.checked_mul(size) {
            Some(bytes) if bytes <= self.remaining() => Ok(()),
            _ => Err(Error::UnexpectedEof(self.cursor.position())),
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|e| self.eof(e))
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(|e| self.eof(e))
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.cursor.read_i32::<LittleEndian>().map_err(|e| self.eof(e))
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.cursor.read_i64::<LittleEndian>().map_err(|e| self.eof(e))
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.cursor.read_f32::<LittleEndian>().map_err(|e| self.eof(e))
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::invalid(format!(
                "invalid bool byte {} at offset {}",
                other,
                self.position() - 1
            ))),
        }
    }

    pub fn len(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    pub fn string(&mut self) -> Result<String> {
        let n = self.len()?;
        self.ensure(n, 1)?;
        let mut bytes = vec![0u8; n];
        self.cursor.read_exact(&mut bytes).map_err(|e| self.eof(e))?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn opt_string(&mut self) -> Result<Option<String>> {
        if self.bool()? {
            Ok(Some(self.string()?))
        } else {
            Ok(None)
        }
    }

    pub fn floats(&mut self) -> Result<Vec<f32>> {
        let n = self.len()?;
        self.ensure(n, 4)?;
        let mut out = vec![0.0f32; n];
        self.cursor
            .read_f32_into::<LittleEndian>(&mut out)
            .map_err(|e| self.eof(e))?;
        Ok(out)
    }

    pub fn ints(&mut self) -> Result<Vec<u32>> {
        let n = self.len()?;
        self.ensure(n, 4)?;
        let mut out = vec![0u32; n];
        self.cursor
            .read_u32_into::<LittleEndian>(&mut out)
            .map_err(|e| self.eof(e))?;
        Ok(out)
    }

    pub fn signed_ints(&mut self) -> Result<Vec<i32>> {
        let n = self.len()?;
        self.ensure(n, 4)?;
        let mut out = vec![0i32; n];
        self.cursor
            .read_i32_into::<LittleEndian>(&mut out)
            .map_err(|e| self.eof(e))?;
        Ok(out)
    }

    pub fn fixed<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0f32; N];
        self.cursor
            .read_f32_into::<LittleEndian>(&mut out)
            .map_err(|e| self.eof(e))?;
        Ok(out)
    }

    pub fn seq<T: Record>(&mut self) -> Result<Vec<T>> {
        let n = self.len()?;
        // Every record takes at least one byte.
        self.ensure(n, 1)?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(T::read(self)?);
        }
        Ok(out)
    }
}

/// A value with a fixed binary layout.
pub trait Record: Sized {
    fn write(&self, w: &mut BodyWriter) -> Result<()>;
    fn read(r: &mut BodyReader<'_>) -> Result<Self>;
}

fn bad_tag(what: &str, tag: u8) -> Error {
    Error::invalid(format!("unknown {} tag {}", what, tag))
}

impl Record for Transform {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.fixed(&self.translation)?;
        w.fixed(&self.rotation)?;
        w.fixed(&self.scale)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            translation: r.fixed()?,
            rotation: r.fixed()?,
            scale: r.fixed()?,
        })
    }
}

impl Record for TObject {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        self.transform.write(w)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            name: r.string()?,
            transform: Transform::read(r)?,
        })
    }
}

// ----------------------------------------------------------------------------
// Meshes
// ----------------------------------------------------------------------------

impl Record for VertexArray {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.u8(self.attrib.code())?;
        w.u32(self.step)?;
        w.floats(&self.floats)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let code = r.u8()?;
        let attrib = VertexAttrib::from_code(code).ok_or_else(|| bad_tag("vertex attribute", code))?;
        Ok(Self {
            attrib,
            step: r.u32()?,
            floats: r.floats()?,
        })
    }
}

impl Record for IndexArray {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.u32(self.step)?;
        w.ints(&self.ints)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            step: r.u32()?,
            ints: r.ints()?,
        })
    }
}

impl Record for Mesh {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        w.u8(match self.primitive {
            Primitive::Triangles => 0,
        })?;
        w.seq(&self.vertex_arrays)?;
        w.seq(&self.index_arrays)?;
        match &self.skin {
            Some(skin) => {
                w.u8(1)?;
                w.ints(&skin.bone_count)?;
                w.ints(&skin.bone_index)?;
                w.floats(&skin.bone_weight)
            }
            None => w.u8(0),
        }
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let id = r.string()?;
        let name = r.string()?;
        let primitive = match r.u8()? {
            0 => Primitive::Triangles,
            t => return Err(bad_tag("primitive", t)),
        };
        let vertex_arrays = r.seq()?;
        let index_arrays = r.seq()?;
        let skin = if r.bool()? {
            Some(Skin {
                bone_count: r.ints()?,
                bone_index: r.ints()?,
                bone_weight: r.floats()?,
            })
        } else {
            None
        };
        Ok(Self {
            id,
            name,
            primitive,
            vertex_arrays,
            index_arrays,
            skin,
        })
    }
}

// ----------------------------------------------------------------------------
// Materials
// ----------------------------------------------------------------------------

impl Record for PropertyValue {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        match self {
            PropertyValue::Color(v) => {
                w.u8(0)?;
                w.fixed(v)
            }
            PropertyValue::Float(v) => {
                w.u8(1)?;
                w.f32(*v)
            }
            PropertyValue::Int(v) => {
                w.u8(2)?;
                w.i32(*v)
            }
            PropertyValue::Bool(v) => {
                w.u8(3)?;
                w.bool(*v)
            }
            PropertyValue::Vec2(v) => {
                w.u8(4)?;
                w.fixed(v)
            }
            PropertyValue::Vec3(v) => {
                w.u8(5)?;
                w.fixed(v)
            }
            PropertyValue::Vec4(v) => {
                w.u8(6)?;
                w.fixed(v)
            }
            PropertyValue::Quat(v) => {
                w.u8(7)?;
                w.fixed(v)
            }
            PropertyValue::Texture(t) => {
                w.u8(8)?;
                w.str(&t.id)?;
                w.str(&t.rpath)
            }
        }
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(match r.u8()? {
            0 => PropertyValue::Color(r.fixed()?),
            1 => PropertyValue::Float(r.f32()?),
            2 => PropertyValue::Int(r.i32()?),
            3 => PropertyValue::Bool(r.bool()?),
            4 => PropertyValue::Vec2(r.fixed()?),
            5 => PropertyValue::Vec3(r.fixed()?),
            6 => PropertyValue::Vec4(r.fixed()?),
            7 => PropertyValue::Quat(r.fixed()?),
            8 => PropertyValue::Texture(TextureRef {
                id: r.string()?,
                rpath: r.string()?,
            }),
            t => return Err(bad_tag("property value", t)),
        })
    }
}

impl Record for MaterialProperty {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        self.value.write(w)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            value: PropertyValue::read(r)?,
        })
    }
}

impl Record for Material {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        w.str(&self.mat_id)?;
        w.seq(&self.properties)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            name: r.string()?,
            mat_id: r.string()?,
            properties: r.seq()?,
        })
    }
}

// ----------------------------------------------------------------------------
// Lights
// ----------------------------------------------------------------------------

impl Record for Falloff {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        match *self {
            Falloff::Constant => w.u8(0),
            Falloff::Linear { end } => {
                w.u8(1)?;
                w.f32(end)
            }
            Falloff::Inverse { scale, constant, linear } => {
                w.u8(2)?;
                w.fixed(&[scale, constant, linear])
            }
            Falloff::InverseSquare { scale, constant, linear, quadratic } => {
                w.u8(3)?;
                w.fixed(&[scale, constant, linear, quadratic])
            }
        }
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(match r.u8()? {
            0 => Falloff::Constant,
            1 => Falloff::Linear { end: r.f32()? },
            2 => {
                let [scale, constant, linear] = r.fixed::<3>()?;
                Falloff::Inverse { scale, constant, linear }
            }
            3 => {
                let [scale, constant, linear, quadratic] = r.fixed::<4>()?;
                Falloff::InverseSquare { scale, constant, linear, quadratic }
            }
            t => return Err(bad_tag("falloff", t)),
        })
    }
}

impl Record for Light {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        w.u8(match self.kind {
            LightKind::Directional => 0,
            LightKind::Point => 1,
            LightKind::Spot => 2,
        })?;
        w.fixed(&self.color)?;
        w.f32(self.intensity)?;
        w.bool(self.cast_shadow)?;
        match self.spot_angle {
            Some(spot) => {
                w.u8(1)?;
                w.f32(spot.max)?;
                w.f32(spot.linear_begin)?;
            }
            None => w.u8(0)?,
        }
        w.f32(self.radial_distance_max)?;
        self.falloff.write(w)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let id = r.string()?;
        let name = r.string()?;
        let kind = match r.u8()? {
            0 => LightKind::Directional,
            1 => LightKind::Point,
            2 => LightKind::Spot,
            t => return Err(bad_tag("light kind", t)),
        };
        let color = r.fixed()?;
        let intensity = r.f32()?;
        let cast_shadow = r.bool()?;
        let spot_angle = if r.bool()? {
            Some(SpotAngle {
                max: r.f32()?,
                linear_begin: r.f32()?,
            })
        } else {
            None
        };
        Ok(Self {
            id,
            name,
            kind,
            color,
            intensity,
            cast_shadow,
            spot_angle,
            radial_distance_max: r.f32()?,
            falloff: Falloff::read(r)?,
        })
    }
}

// ----------------------------------------------------------------------------
// Skeletons and animation
// ----------------------------------------------------------------------------

impl Record for Bone {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        self.transform.write(w)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            name: r.string()?,
            transform: Transform::read(r)?,
        })
    }
}

impl Record for Skeleton {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        w.seq(&self.bones)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            name: r.string()?,
            bones: r.seq()?,
        })
    }
}

impl Record for Clip {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        if self.translation.len() != self.at.len()
            || self.rotation.len() != self.at.len()
            || self.scale.len() != self.at.len()
        {
            return Err(Error::invalid("clip arrays have unequal lengths"));
        }
        w.opt_str(self.bone_name.as_deref())?;
        w.signed_ints(&self.at)?;
        for v in &self.translation {
            w.fixed(v)?;
        }
        for v in &self.rotation {
            w.fixed(v)?;
        }
        for v in &self.scale {
            w.fixed(v)?;
        }
        Ok(())
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let bone_name = r.opt_string()?;
        let at = r.signed_ints()?;
        let n = at.len();
        r.ensure(n, 40)?;
        let mut translation = Vec::with_capacity(n);
        for _ in 0..n {
            translation.push(r.fixed()?);
        }
        let mut rotation = Vec::with_capacity(n);
        for _ in 0..n {
            rotation.push(r.fixed()?);
        }
        let mut scale = Vec::with_capacity(n);
        for _ in 0..n {
            scale.push(r.fixed()?);
        }
        Ok(Self {
            bone_name,
            at,
            translation,
            rotation,
            scale,
        })
    }
}

impl Record for AnimationKf {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        w.u32(self.duration)?;
        w.u8(match self.target_kind {
            TargetKind::Object => 0,
            TargetKind::Skeleton => 1,
        })?;
        w.seq(&self.clips)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let id = r.string()?;
        let name = r.string()?;
        let duration = r.u32()?;
        let target_kind = match r.u8()? {
            0 => TargetKind::Object,
            1 => TargetKind::Skeleton,
            t => return Err(bad_tag("animation target", t)),
        };
        Ok(Self {
            id,
            name,
            duration,
            target_kind,
            clips: r.seq()?,
        })
    }
}

// ----------------------------------------------------------------------------
// Physics
// ----------------------------------------------------------------------------

fn shape_code(shape: CollisionShape) -> u8 {
    match shape {
        CollisionShape::Mesh => 0,
        CollisionShape::Sphere => 1,
        CollisionShape::Hull => 2,
        CollisionShape::Box => 3,
        CollisionShape::Capsule => 4,
        CollisionShape::Cylinder => 5,
        CollisionShape::Cone => 6,
    }
}

fn shape_from_code(code: u8) -> Result<CollisionShape> {
    Ok(match code {
        0 => CollisionShape::Mesh,
        1 => CollisionShape::Sphere,
        2 => CollisionShape::Hull,
        3 => CollisionShape::Box,
        4 => CollisionShape::Capsule,
        5 => CollisionShape::Cylinder,
        6 => CollisionShape::Cone,
        t => return Err(bad_tag("collision shape", t)),
    })
}

impl Record for RigidBody {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.u8(match self.kind {
            RigidBodyType::Static => 0,
            RigidBodyType::Dynamic => 1,
        })?;
        w.f32(self.mass)?;
        w.bool(self.is_kinematic)?;
        w.f32(self.friction)?;
        w.f32(self.restitution)?;
        w.f32(self.margin)?;
        w.f32(self.linear_damping)?;
        w.f32(self.angular_damping)?;
        w.fixed(&self.angular_factor)?;
        w.fixed(&self.linear_factor)?;
        w.u8(shape_code(self.shape))?;
        w.u32(self.collision_group)?;
        w.u32(self.collision_mask)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let id = r.string()?;
        let kind = match r.u8()? {
            0 => RigidBodyType::Static,
            1 => RigidBodyType::Dynamic,
            t => return Err(bad_tag("rigid body type", t)),
        };
        Ok(Self {
            id,
            kind,
            mass: r.f32()?,
            is_kinematic: r.bool()?,
            friction: r.f32()?,
            restitution: r.f32()?,
            margin: r.f32()?,
            linear_damping: r.f32()?,
            angular_damping: r.f32()?,
            angular_factor: r.fixed()?,
            linear_factor: r.fixed()?,
            shape: shape_from_code(r.u8()?)?,
            collision_group: r.u32()?,
            collision_mask: r.u32()?,
        })
    }
}

impl Record for Constraint {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.a_ref)?;
        w.str(&self.b_ref)?;
        match &self.generic {
            Some(g) => {
                w.u8(1)?;
                w.fixed(&g.pivot_a)?;
                w.fixed(&g.pivot_b)?;
                w.bool(g.disable_collisions)?;
                w.fixed(&g.upper_linear_limit)?;
                w.fixed(&g.lower_linear_limit)?;
                w.fixed(&g.upper_angular_limit)?;
                w.fixed(&g.lower_angular_limit)
            }
            None => w.u8(0),
        }
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let id = r.string()?;
        let a_ref = r.string()?;
        let b_ref = r.string()?;
        let generic = if r.bool()? {
            Some(GenericConstraint {
                pivot_a: r.fixed()?,
                pivot_b: r.fixed()?,
                disable_collisions: r.bool()?,
                upper_linear_limit: r.fixed()?,
                lower_linear_limit: r.fixed()?,
                upper_angular_limit: r.fixed()?,
                lower_angular_limit: r.fixed()?,
            })
        } else {
            None
        };
        Ok(Self {
            id,
            a_ref,
            b_ref,
            generic,
        })
    }
}

// ----------------------------------------------------------------------------
// Audio, parameters, fields, relations
// ----------------------------------------------------------------------------

impl Record for Speaker {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        w.str(&self.rpath)?;
        w.fixed(&[
            self.volume,
            self.pitch,
            self.distance_max,
            self.distance_reference,
            self.attenuation,
        ])
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let id = r.string()?;
        let name = r.string()?;
        let rpath = r.string()?;
        let [volume, pitch, distance_max, distance_reference, attenuation] = r.fixed::<5>()?;
        Ok(Self {
            id,
            name,
            rpath,
            volume,
            pitch,
            distance_max,
            distance_reference,
            attenuation,
        })
    }
}

impl Record for CustomParam {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.name)?;
        match &self.value {
            CustomValue::Bool(v) => {
                w.u8(0)?;
                w.bool(*v)
            }
            CustomValue::String(v) => {
                w.u8(1)?;
                w.str(v)
            }
            CustomValue::Float(v) => {
                w.u8(2)?;
                w.f32(*v)
            }
            CustomValue::Int(v) => {
                w.u8(3)?;
                w.i64(*v)
            }
            CustomValue::Vec3(v) => {
                w.u8(4)?;
                w.fixed(v)
            }
            CustomValue::Quat(v) => {
                w.u8(5)?;
                w.fixed(v)
            }
        }
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        let name = r.string()?;
        let value = match r.u8()? {
            0 => CustomValue::Bool(r.bool()?),
            1 => CustomValue::String(r.string()?),
            2 => CustomValue::Float(r.f32()?),
            3 => CustomValue::Int(r.i64()?),
            4 => CustomValue::Vec3(r.fixed()?),
            5 => CustomValue::Quat(r.fixed()?),
            t => return Err(bad_tag("custom value", t)),
        };
        Ok(Self { name, value })
    }
}

impl Record for CustomParams {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.seq(&self.params)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            params: r.seq()?,
        })
    }
}

impl Record for ForceField {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.fixed(&self.gravity)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            gravity: r.fixed()?,
        })
    }
}

impl Record for CollisionPlane {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.id)?;
        w.str(&self.name)?;
        w.fixed(&self.point)?;
        w.fixed(&self.normal)?;
        w.fixed(&self.extents)?;
        w.f32(self.damping)?;
        w.f32(self.damping_randomness)?;
        w.f32(self.friction)?;
        w.f32(self.friction_randomness)?;
        w.f32(self.stickiness)?;
        w.f32(self.permeability)?;
        w.bool(self.kill_particles)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.string()?,
            name: r.string()?,
            point: r.fixed()?,
            normal: r.fixed()?,
            extents: r.fixed()?,
            damping: r.f32()?,
            damping_randomness: r.f32()?,
            friction: r.f32()?,
            friction_randomness: r.f32()?,
            stickiness: r.f32()?,
            permeability: r.f32()?,
            kill_particles: r.bool()?,
        })
    }
}

impl Record for Relation {
    fn write(&self, w: &mut BodyWriter) -> Result<()> {
        w.str(&self.ref1)?;
        w.str(&self.ref2)
    }

    fn read(r: &mut BodyReader<'_>) -> Result<Self> {
        Ok(Self {
            ref1: r.string()?,
            ref2: r.string()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_one<T: Record>(value: &T) -> Vec<u8> {
        let mut w = BodyWriter::new();
        value.write(&mut w).unwrap();
        w.into_inner()
    }

    #[test]
    fn test_string_layout() {
        let bytes = encode_one(&Relation {
            ref1: "ob1".into(),
            ref2: "me2".into(),
        });
        assert_eq!(&bytes[..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..7], b"ob1");
        assert_eq!(bytes.len(), 14);
    }

    #[test]
    fn test_infinite_limits_survive() {
        let c = Constraint {
            id: "rc1".into(),
            a_ref: "rb1".into(),
            b_ref: "rb2".into(),
            generic: Some(GenericConstraint {
                pivot_a: [0.0; 3],
                pivot_b: [1.0, 2.0, 3.0],
                disable_collisions: true,
                upper_linear_limit: [f32::INFINITY; 3],
                lower_linear_limit: [f32::NEG_INFINITY; 3],
                upper_angular_limit: [0.5; 3],
                lower_angular_limit: [-0.5; 3],
            }),
        };
        let bytes = encode_one(&c);
        let back = Constraint::read(&mut BodyReader::new(&bytes)).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_negative_clip_times_survive() {
        let clip = Clip {
            bone_name: Some("arm".into()),
            at: vec![-416, -41, 0, 375],
            translation: vec![[0.0; 3]; 4],
            rotation: vec![[0.0, 0.0, 0.0, 1.0]; 4],
            scale: vec![[1.0; 3]; 4],
        };
        let bytes = encode_one(&clip);
        let back = Clip::read(&mut BodyReader::new(&bytes)).unwrap();
        assert_eq!(back.at, [-416, -41, 0, 375]);
        assert_eq!(back, clip);
    }

    #[test]
    fn test_truncated_input_reports_offset() {
        let bytes = encode_one(&TObject {
            id: "ob1".into(),
            name: "Cube".into(),
            transform: Transform::default(),
        });
        let cut = &bytes[..bytes.len() - 2];
        let err = TObject::read(&mut BodyReader::new(cut)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(_)));
    }

    #[test]
    fn test_huge_count_rejected_without_allocating() {
        let mut w = BodyWriter::new();
        w.u32(u32::MAX).unwrap();
        let bytes = w.into_inner();
        assert!(matches!(
            BodyReader::new(&bytes).floats(),
            Err(Error::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_bad_bool_byte() {
        assert!(BodyReader::new(&[7]).bool().is_err());
    }
}
