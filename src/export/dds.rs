//! Batch texture conversion through an external DDS writer.
//!
//! Conversion is best effort: a failing batch is logged and its source
//! textures are left in place, everything else proceeds.

use std::path::{Path, PathBuf};
use std::process::Command;

use rayon::prelude::*;

use crate::util::{Error, Result};

/// One texture to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsJob {
    /// Writer format name (`S3TC_DXT5`, `ATI_3DC`, `ARGB8`, ...).
    pub format: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Pick the writer format from a texture's `dds{solid=..,alpha=..}` options.
///
/// `solid` textures use the `solid` key, others the `alpha` key. Unknown or
/// missing values fall back to uncompressed `ARGB8`.
pub fn dds_format(args: &str, solid: bool) -> String {
    let wanted = if solid { "solid" } else { "alpha" };
    let mut format: Option<String> = None;

    if let Some(start) = args.find("dds{") {
        let body = &args[start + 4..];
        let body = body.find('}').map_or(body, |end| &body[..end]);
        for entry in body.split(',') {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            if key.trim() == wanted {
                format = Some(value.replace(['\'', '"'], "").trim().to_string());
                break;
            }
        }
    }

    match format.map(|f| f.to_ascii_uppercase()).as_deref() {
        Some("ATI2") | Some("3DC") => "ATI_3DC".to_string(),
        Some(f @ ("DXT1" | "DXT3" | "DXT5")) => format!("S3TC_{}", f),
        Some("UNCOMPRESSED") | Some("") | None => "ARGB8".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Runs one batch of conversion jobs.
pub trait BatchRunner: Send + Sync {
    fn run(&self, batch: &[DdsJob]) -> Result<()>;
}

/// Invokes the DDS writer executable once per batch.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    pub writer: PathBuf,
    /// Passed through as `--multires <levels>`.
    pub multires: Option<String>,
}

impl CommandRunner {
    pub fn new(writer: impl Into<PathBuf>, multires: Option<String>) -> Self {
        Self {
            writer: writer.into(),
            multires,
        }
    }

    /// Command line for `batch`; lists are comma separated, in job order.
    pub fn command(&self, batch: &[DdsJob]) -> Command {
        let list = |f: fn(&DdsJob) -> String| batch.iter().map(f).collect::<Vec<_>>().join(",");
        let mut cmd = Command::new(&self.writer);
        cmd.arg("--use-opengl")
            .arg("--gen-mipmaps")
            .arg("--format")
            .arg(list(|j| j.format.clone()))
            .arg("--inlist")
            .arg(list(|j| j.input.to_string_lossy().into_owned()))
            .arg("--outlist")
            .arg(list(|j| j.output.to_string_lossy().into_owned()));
        if let Some(multires) = &self.multires {
            cmd.arg("--multires").arg(multires);
        }
        cmd
    }
}

impl BatchRunner for CommandRunner {
    fn run(&self, batch: &[DdsJob]) -> Result<()> {
        tracing::info!("Run {:?} on {} texture(s)", self.writer, batch.len());
        let status = self.command(batch).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::other(format!("dds writer exited with {}", status)))
        }
    }
}

/// Outcome of [`convert_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub batches: usize,
    pub converted: usize,
    pub failed: usize,
}

/// Convert `jobs` in batches of `batch_size`.
///
/// The first batch always runs to completion on the calling thread; the
/// remaining batches run on a pool of `concurrency` workers. Source files of
/// successful batches are removed once every batch has finished.
pub fn convert_all(
    jobs: &[DdsJob],
    runner: &dyn BatchRunner,
    batch_size: usize,
    concurrency: usize,
) -> Result<ConversionSummary> {
    if jobs.is_empty() {
        return Ok(ConversionSummary::default());
    }
    let batches: Vec<&[DdsJob]> = jobs.chunks(batch_size.max(1)).collect();

    let run = |batch: &[DdsJob]| -> bool {
        match runner.run(batch) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("texture conversion of {} file(s) failed: {}", batch.len(), e);
                false
            }
        }
    };

    let mut results = Vec::with_capacity(batches.len());
    results.push(run(batches[0]));

    let rest = &batches[1..];
    if !rest.is_empty() {
        if concurrency <= 1 {
            results.extend(rest.iter().map(|b| run(b)));
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(concurrency)
                .build()
                .map_err(|e| Error::other(format!("conversion pool: {}", e)))?;
            let tail: Vec<bool> = pool.install(|| rest.par_iter().map(|b| run(b)).collect());
            results.extend(tail);
        }
    }

    let mut summary = ConversionSummary {
        batches: batches.len(),
        ..Default::default()
    };
    for (batch, ok) in batches.iter().zip(&results) {
        if *ok {
            summary.converted += batch.len();
            for job in batch.iter() {
                remove_source(&job.input);
            }
        } else {
            summary.failed += batch.len();
        }
    }
    Ok(summary)
}

fn remove_source(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::debug!("could not remove converted source {:?}: {}", path, e);
    }
}
