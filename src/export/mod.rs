//! Export orchestration: scene snapshot in, [`Document`] out.
//!
//! One [`Exporter::export`] call walks the scene in a fixed phase order:
//!
//! 1. collision planes
//! 2. objects (with custom parameters)
//! 3. speakers
//! 4. geometries
//! 5. materials (and their textures)
//! 6. lights
//! 7. skeletons
//! 8. actions
//! 9. physics
//! 10. force fields
//! 11. texture conversion
//!
//! Every phase asks the [`IdentityRegistry`] whether an entity still needs
//! exporting, so an entity reached from several places lands in the document
//! once. Relations are emitted on every visit of a structural link.
//!
//! Errors on a single entity are logged, recorded in the [`ExportReport`]
//! and the run goes on. Only identity and document integrity errors abort
//! the run (see [`Error::is_fatal`]).

mod animation;
pub mod assets;
pub mod config;
pub mod dds;
mod geometry;
mod lights;
mod materials;
mod objects;
mod physics;

pub use assets::AssetWriter;
pub use config::ExportConfig;
pub use dds::{convert_all, dds_format, BatchRunner, CommandRunner, ConversionSummary, DdsJob};

use crate::core::IdentityRegistry;
use crate::document::{Document, DocumentBuilder};
use crate::scene::{
    AssetLocator, FrameContext, MaterialResolver, Scene, SceneObject, SnapshotAssetLocator,
    SnapshotMaterialResolver,
};
use crate::util::{Error, Result};

/// An entity left out of the document, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Identity (or name, when no identity was assigned yet).
    pub entity: String,
    pub reason: String,
}

/// Per-entity problems and asset statistics of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub skipped: Vec<Skipped>,
    pub assets_written: usize,
    pub textures_converted: usize,
    pub conversion_failures: usize,
}

impl ExportReport {
    /// No entity skipped and no conversion failed.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.conversion_failures == 0
    }
}

/// Result of a successful export run.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub document: Document,
    pub report: ExportReport,
}

/// Scene exporter with pluggable host collaborators.
pub struct Exporter {
    config: ExportConfig,
    materials: Box<dyn MaterialResolver>,
    assets: Box<dyn AssetLocator>,
    converter: Option<Box<dyn BatchRunner>>,
}

impl Exporter {
    /// Exporter reading materials and assets straight from the snapshot.
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            materials: Box::new(SnapshotMaterialResolver),
            assets: Box::new(SnapshotAssetLocator::default()),
            converter: None,
        }
    }

    pub fn with_material_resolver(mut self, resolver: impl MaterialResolver + 'static) -> Self {
        self.materials = Box::new(resolver);
        self
    }

    pub fn with_asset_locator(mut self, locator: impl AssetLocator + 'static) -> Self {
        self.assets = Box::new(locator);
        self
    }

    /// Replace the DDS writer invocation (used when `textures_to_dds` is set).
    pub fn with_batch_runner(mut self, runner: impl BatchRunner + 'static) -> Self {
        self.converter = Some(Box::new(runner));
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export with a fresh registry; every entity is exported.
    pub fn export(&self, scene: &Scene) -> Result<ExportOutcome> {
        self.export_with(scene, &IdentityRegistry::new())
    }

    /// Export against a registry that outlives the run.
    ///
    /// Entities the registry already reports clean are not exported again;
    /// relations to them are still emitted.
    pub fn export_with(&self, scene: &Scene, registry: &IdentityRegistry) -> Result<ExportOutcome> {
        tracing::info!(
            "Exporting scene: {} objects, {} meshes, {} actions",
            scene.objects.len(),
            scene.meshes.len(),
            scene.actions.len()
        );
        let fallback;
        let converter: Option<&dyn BatchRunner> = match (&self.converter, &self.config.dds_writer) {
            (Some(runner), _) => Some(runner.as_ref()),
            (None, Some(writer)) => {
                fallback = CommandRunner::new(writer, self.config.dds_multires.clone());
                Some(&fallback)
            }
            (None, None) => None,
        };
        let mut run = ExportRun::new(self, scene, registry, converter);

        run.export_collision_planes()?;
        run.export_objects()?;
        run.export_speakers()?;
        run.export_geometries()?;
        run.export_materials()?;
        run.export_lights()?;
        run.export_skeletons()?;
        run.export_actions()?;
        run.export_physics()?;
        run.export_force_fields()?;
        run.convert_textures()?;

        run.finish()
    }
}

/// Export `scene` with the default collaborators.
pub fn export_scene(scene: &Scene, config: &ExportConfig) -> Result<ExportOutcome> {
    Exporter::new(config.clone()).export(scene)
}

/// State of one export run, shared by all phases.
pub(crate) struct ExportRun<'a> {
    scene: &'a Scene,
    config: &'a ExportConfig,
    registry: &'a IdentityRegistry,
    materials: &'a dyn MaterialResolver,
    assets: &'a dyn AssetLocator,
    writer: AssetWriter,
    builder: DocumentBuilder,
    ctx: FrameContext<'a>,
    report: ExportReport,
    converter: Option<&'a dyn BatchRunner>,
    dds_jobs: Vec<DdsJob>,
}

impl<'a> ExportRun<'a> {
    fn new(
        exporter: &'a Exporter,
        scene: &'a Scene,
        registry: &'a IdentityRegistry,
        converter: Option<&'a dyn BatchRunner>,
    ) -> Self {
        let config = &exporter.config;
        // Entities written by earlier runs stay valid relation targets.
        let mut builder = DocumentBuilder::new(config.strictness);
        builder.assume_present(registry.exported_ids());
        Self {
            scene,
            config,
            registry,
            materials: exporter.materials.as_ref(),
            assets: exporter.assets.as_ref(),
            writer: AssetWriter::new(&config.assets_path, config.copy_assets),
            builder,
            ctx: FrameContext::new(scene),
            report: ExportReport::default(),
            converter: converter.filter(|_| config.converts_textures()),
            dds_jobs: Vec::new(),
        }
    }

    /// Not hidden, and selected when only the selection is exported.
    fn is_exportable(&self, obj: &SceneObject) -> bool {
        !obj.hidden && (!self.config.export_selection || obj.selected)
    }

    /// Exportable objects in scene order.
    fn exportable_objects(&self) -> Vec<&'a SceneObject> {
        let scene = self.scene;
        scene.objects.iter().filter(|o| self.is_exportable(o)).collect()
    }

    /// Whether textures get converted to DDS in this run.
    fn converts_textures(&self) -> bool {
        self.converter.is_some()
    }

    /// Keep fatal errors, turn the rest into a report entry.
    fn recover<T>(&mut self, entity: &str, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!("skip '{}': {}", entity, e);
                self.report.skipped.push(Skipped {
                    entity: entity.to_string(),
                    reason: e.to_string(),
                });
                Ok(None)
            }
        }
    }

    fn relate(&mut self, ref1: &str, ref2: &str) -> Result<()> {
        self.builder.add_relation(ref1, ref2)
    }

    fn convert_textures(&mut self) -> Result<()> {
        let Some(runner) = self.converter else {
            return Ok(());
        };
        if self.dds_jobs.is_empty() {
            return Ok(());
        }
        let jobs = std::mem::take(&mut self.dds_jobs);
        let summary = convert_all(&jobs, runner, self.config.dds_batch_size, self.config.dds_concurrency)?;
        tracing::info!(
            "Converted {} texture(s) in {} batch(es), {} failed",
            summary.converted,
            summary.batches,
            summary.failed
        );
        self.report.textures_converted += summary.converted;
        self.report.conversion_failures += summary.failed;
        Ok(())
    }

    fn finish(self) -> Result<ExportOutcome> {
        let document = self.builder.finish()?;
        self.registry.record_exported(document.ids());
        tracing::info!(
            "Exported {} objects, {} meshes, {} materials, {} lights, {} skeletons, {} animations",
            document.objects.len(),
            document.meshes.len(),
            document.materials.len(),
            document.lights.len(),
            document.skeletons.len(),
            document.animations.len()
        );
        tracing::info!(
            "Exported {} rigid bodies, {} constraints, {} speakers, {} parameter sets, {} force fields, {} collision planes, {} relations",
            document.rigid_bodies.len(),
            document.constraints.len(),
            document.speakers.len(),
            document.custom_params.len(),
            document.force_fields.len(),
            document.collision_planes.len(),
            document.relations.len()
        );
        if !self.report.skipped.is_empty() {
            tracing::warn!("{} entities skipped", self.report.skipped.len());
        }
        Ok(ExportOutcome {
            document,
            report: self.report,
        })
    }
}

/// Missing snapshot entry referenced by handle.
fn missing(kind: &str, handle: u64) -> Error {
    Error::invalid(format!("{} {} is not part of the scene", kind, handle))
}
