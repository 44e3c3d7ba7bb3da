//! Grid Generation: tiling sampled frames into contact-sheet images.
//!
//! Layout:
//! - Frames are taken in batches of [`FRAMES_PER_GRID`] (5 columns x 4 rows).
//! - Each frame is resized and center-cropped to a 200x120 tile.
//! - Tiles are placed row-major by their index within the batch.
//! - Every grid, including a partial last one, uses the full canvas size.
//!
//! Rendering is CPU-bound and runs on the blocking pool.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::domain::PipelineError;

pub const GRID_COLUMNS: u32 = 5;
pub const GRID_ROWS: u32 = 4;
pub const TILE_WIDTH: u32 = 200;
pub const TILE_HEIGHT: u32 = 120;
pub const FRAMES_PER_GRID: usize = (GRID_COLUMNS * GRID_ROWS) as usize;

/// Where grid `n` (1-based) of one task is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridNaming {
    dir: PathBuf,
    stem: String,
}

impl GridNaming {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    pub fn path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}_grid_{n}.jpg", self.stem))
    }
}

/// Number of grids needed for `frame_count` frames.
pub fn grid_count(frame_count: usize) -> usize {
    frame_count.div_ceil(FRAMES_PER_GRID)
}

/// Split frames into per-grid batches, preserving order.
pub fn partition(frames: &[PathBuf]) -> Vec<&[PathBuf]> {
    frames.chunks(FRAMES_PER_GRID).collect()
}

/// Top-left pixel of the tile at batch-local `index`.
pub fn tile_origin(index: usize) -> (u32, u32) {
    let index = index as u32;
    let col = index % GRID_COLUMNS;
    let row = index / GRID_COLUMNS;
    (col * TILE_WIDTH, row * TILE_HEIGHT)
}

/// Render one batch onto a fresh canvas.
pub fn render_grid(batch: &[PathBuf]) -> Result<RgbImage, PipelineError> {
    let mut canvas = RgbImage::new(GRID_COLUMNS * TILE_WIDTH, GRID_ROWS * TILE_HEIGHT);
    for (index, frame) in batch.iter().take(FRAMES_PER_GRID).enumerate() {
        let tile = image::open(frame)
            .map_err(|e| PipelineError::Image {
                path: frame.clone(),
                message: e.to_string(),
            })?
            .resize_to_fill(TILE_WIDTH, TILE_HEIGHT, FilterType::Lanczos3)
            .to_rgb8();
        let (x, y) = tile_origin(index);
        imageops::replace(&mut canvas, &tile, i64::from(x), i64::from(y));
    }
    Ok(canvas)
}

/// Render and write every grid synchronously; returns paths numbered from 1.
pub fn write_grids(frames: &[PathBuf], naming: &GridNaming) -> Result<Vec<PathBuf>, PipelineError> {
    if frames.is_empty() {
        return Err(PipelineError::Stage("no frames extracted".into()));
    }
    std::fs::create_dir_all(&naming.dir).map_err(|e| PipelineError::io(&naming.dir, e))?;

    let mut written = Vec::with_capacity(grid_count(frames.len()));
    for (i, batch) in partition(frames).into_iter().enumerate() {
        let out = naming.path(i + 1);
        render_grid(batch)?
            .save(&out)
            .map_err(|e| image_error(&out, e))?;
        written.push(out);
    }
    Ok(written)
}

/// [`write_grids`] on the blocking pool.
pub async fn compose_grids(
    frames: Vec<PathBuf>,
    naming: GridNaming,
) -> Result<Vec<PathBuf>, PipelineError> {
    tokio::task::spawn_blocking(move || write_grids(&frames, &naming))
        .await
        .map_err(|e| PipelineError::Stage(format!("grid rendering task failed: {e}")))?
}

fn image_error(path: &Path, err: image::ImageError) -> PipelineError {
    PipelineError::Image {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
