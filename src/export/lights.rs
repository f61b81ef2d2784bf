//! Light sources.

use super::{missing, ExportRun};
use crate::core::{EntityClass, SourceKey};
use crate::document::{Falloff, Light, LightKind, SpotAngle};
use crate::scene::{LightData, ObjectData, SourceFalloff, SourceLightKind};
use crate::util::Result;

/// Radial attenuation of a light without node-based emission.
fn falloff(data: &LightData) -> Falloff {
    if data.use_sphere {
        return Falloff::Linear { end: 1.0 };
    }
    match data.falloff {
        SourceFalloff::Constant => Falloff::Constant,
        SourceFalloff::InverseLinear => Falloff::Inverse {
            scale: 1.0,
            constant: 0.0,
            linear: 0.0,
        },
        SourceFalloff::InverseSquare => Falloff::InverseSquare {
            scale: 1.0,
            constant: 0.0,
            linear: 0.0,
            quadratic: 0.0,
        },
        SourceFalloff::LinearQuadraticWeighted { linear, quadratic } if quadratic == 0.0 => Falloff::Inverse {
            scale: 1.0,
            constant: 1.0,
            linear,
        },
        SourceFalloff::LinearQuadraticWeighted { linear, quadratic } => Falloff::InverseSquare {
            scale: 1.0,
            constant: 1.0,
            linear,
            quadratic,
        },
    }
}

/// Convert host light settings; `id` becomes the light's identity.
pub fn convert_light(id: String, data: &LightData) -> Light {
    let (kind, spot_angle) = match data.kind {
        SourceLightKind::Sun | SourceLightKind::Area | SourceLightKind::Hemi => (LightKind::Directional, None),
        SourceLightKind::Point => (LightKind::Point, None),
        SourceLightKind::Spot => (
            LightKind::Spot,
            Some(SpotAngle {
                max: data.spot_size * 0.5,
                linear_begin: 1.0 - data.spot_blend,
            }),
        ),
    };

    // Node-based emission overrides the plain light settings
    let (color, intensity, cast_shadow, falloff) = match &data.emission {
        Some(emission) => (emission.color.to_array(), emission.strength, emission.cast_shadow, Falloff::Constant),
        None => (
            [data.color.x, data.color.y, data.color.z, 1.0],
            data.energy,
            data.use_shadow,
            falloff(data),
        ),
    };

    Light {
        id,
        name: data.name.clone(),
        kind,
        color,
        intensity,
        cast_shadow,
        spot_angle,
        radial_distance_max: data.distance,
        falloff,
    }
}

impl ExportRun<'_> {
    pub(super) fn export_lights(&mut self) -> Result<()> {
        for obj in self.exportable_objects() {
            let ObjectData::Light(handle) = obj.data else {
                continue;
            };
            let key = SourceKey::new(EntityClass::Light, handle);
            let id = self.registry.id_of(key)?;
            let object_id = self.registry.id_of(SourceKey::object(obj.handle))?;

            if self.registry.need_update(key) {
                match self.scene.light(handle) {
                    Some(data) => {
                        self.builder.add(convert_light(id.clone(), data))?;
                    }
                    None => {
                        self.recover::<()>(&id, Err(missing("light", handle)))?;
                        self.registry.mark_dirty(key);
                        continue;
                    }
                }
            }
            self.relate(&id, &object_id)?;
        }
        Ok(())
    }
}
