//! Materials and the textures they reference.

use std::path::Path;

use super::{dds_format, missing, DdsJob, ExportRun};
use crate::core::{EntityClass, SourceKey};
use crate::document::{Material, MaterialProperty, PropertyValue, TextureRef};
use crate::scene::{MaterialData, ResolvedMaterial, ResolvedValue};
use crate::util::Result;

/// `rpath` with its extension replaced by `dds`.
fn dds_rpath(rpath: &str) -> String {
    Path::new(rpath)
        .with_extension("dds")
        .to_string_lossy()
        .replace('\\', "/")
}

impl ExportRun<'_> {
    pub(super) fn export_materials(&mut self) -> Result<()> {
        for obj in self.exportable_objects() {
            for handle in obj.material_slots.iter().flatten().copied() {
                let key = SourceKey::material(handle);
                let id = self.registry.id_of(key)?;
                if !self.registry.need_update(key) {
                    continue;
                }

                let resolved = match self.scene.material(handle) {
                    Some(data) => self.materials.resolve(data).map(|r| (data, r)),
                    None => Err(missing("material", handle)),
                };
                let material = match self.recover(&id, resolved)? {
                    Some((data, resolved)) => self.material(&id, data, resolved)?,
                    None => Material {
                        id: id.clone(),
                        name: self.scene.material(handle).map(|m| m.name.clone()).unwrap_or_default(),
                        mat_id: String::new(),
                        properties: Vec::new(),
                    },
                };
                tracing::debug!(
                    "material '{}' ({}): {} properties",
                    material.name,
                    material.mat_id,
                    material.properties.len()
                );
                self.builder.add(material)?;
            }
        }
        Ok(())
    }

    fn material(&mut self, id: &str, data: &MaterialData, resolved: ResolvedMaterial) -> Result<Material> {
        let mut properties = Vec::with_capacity(resolved.properties.len());
        for property in resolved.properties {
            let value = match property.value {
                ResolvedValue::Color(c) => PropertyValue::Color(c),
                ResolvedValue::Float(f) => PropertyValue::Float(f),
                ResolvedValue::Int(i) => PropertyValue::Int(i),
                ResolvedValue::Bool(b) => PropertyValue::Bool(b),
                ResolvedValue::Vec2(v) => PropertyValue::Vec2(v),
                ResolvedValue::Vec3(v) => PropertyValue::Vec3(v),
                ResolvedValue::Vec4(v) => PropertyValue::Vec4(v),
                ResolvedValue::Quat(q) => PropertyValue::Quat(q),
                ResolvedValue::Texture { image, args, solid } => {
                    let texture = self.export_texture(image, &args, solid);
                    match self.recover(&format!("{}/{}", id, property.name), texture)? {
                        Some(texture) => PropertyValue::Texture(texture),
                        None => continue,
                    }
                }
            };
            properties.push(MaterialProperty {
                id: property.name,
                value,
            });
        }
        Ok(Material {
            id: id.to_string(),
            name: data.name.clone(),
            mat_id: resolved.mat_id,
            properties,
        })
    }

    /// Reference to an image, copying (and queueing conversion of) the file
    /// the first time the image is seen.
    fn export_texture(&mut self, handle: u64, args: &str, solid: bool) -> Result<TextureRef> {
        let key = SourceKey::new(EntityClass::Image, handle);
        let id = self.registry.id_of(key)?;
        let image = self.scene.image(handle).ok_or_else(|| missing("image", handle))?;
        let located = self.assets.locate_image(image)?;

        let convert = self.converts_textures();
        let rpath = if convert { dds_rpath(&located.rpath) } else { located.rpath.clone() };

        if self.registry.need_update(key) {
            let written = self.writer.write(&id, &located);
            let written = self.recover(&id, written)?;
            if written.is_none() {
                self.registry.mark_dirty(key);
            }
            if let Some(Some(path)) = written {
                self.report.assets_written += 1;
                if convert && located.extension != "dds" {
                    let job = DdsJob {
                        format: dds_format(args, solid),
                        input: path,
                        output: self.writer.destination(&rpath),
                    };
                    tracing::debug!("queue {:?} for conversion to {}", job.input, job.format);
                    self.dds_jobs.push(job);
                }
            }
        } else {
            tracing::debug!("image '{}' already exported", image.name);
        }

        Ok(TextureRef { id, rpath })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dds_rpath() {
        assert_eq!(dds_rpath("Textures/wood.png"), "Textures/wood.dds");
        assert_eq!(dds_rpath("Textures/noext"), "Textures/noext.dds");
        assert_eq!(dds_rpath("Textures/a.dds"), "Textures/a.dds");
    }
}
