use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use dxf::entities::{Entity, EntityType, Line};
use dxf::enums::AcadVersion;
use dxf::{Drawing, Point};
use resvg::render;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Options, Tree};

use crate::document::VectorDocument;

/// Writes every segment as a DXF `LINE` entity.
///
/// Raster rows grow downwards while CAD y grows upwards, so y is mirrored
/// around the canvas height.
pub fn write_dxf(document: &VectorDocument, output_path: &Path) -> Result<()> {
    let drawing = build_drawing(document);
    let path = output_path
        .to_str()
        .ok_or_else(|| anyhow!("output path is not valid UTF-8: {}", output_path.display()))?;
    drawing
        .save_file(path)
        .with_context(|| format!("failed to write DXF: {}", output_path.display()))?;
    debug!("wrote {} line(s) to {}", document.segments.len(), path);
    Ok(())
}

fn build_drawing(document: &VectorDocument) -> Drawing {
    let mut drawing = Drawing::new();
    drawing.header.version = AcadVersion::R2010;
    let height = f64::from(document.height);
    for segment in &document.segments {
        let start = Point::new(f64::from(segment.x1), height - f64::from(segment.y1), 0.0);
        let end = Point::new(f64::from(segment.x2), height - f64::from(segment.y2), 0.0);
        drawing.add_entity(Entity::new(EntityType::Line(Line::new(start, end))));
    }
    drawing
}

/// Rasterizes the SVG preview onto a white background and encodes it as PNG.
pub fn render_png(document: &VectorDocument) -> Result<Vec<u8>> {
    let svg = document.to_svg();
    let tree = Tree::from_str(&svg, &Options::default()).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode PNG preview")?;
    Ok(bytes)
}

pub fn write_png(document: &VectorDocument, output_path: &Path) -> Result<()> {
    let bytes = render_png(document)?;
    std::fs::write(output_path, bytes)
        .with_context(|| format!("failed to write PNG: {}", output_path.display()))
}

pub fn write_svg(document: &VectorDocument, output_path: &Path) -> Result<()> {
    std::fs::write(output_path, document.to_svg())
        .with_context(|| format!("failed to write SVG: {}", output_path.display()))
}
