//! YOLO dataset helpers: label files (`class x_center y_center width height`,
//! one box per line, normalized) and letterbox resizing of whole splits.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

use crate::error::Error;
use crate::geometry::{map_box, NormalizedBox, ResizePlan, Size};

const JPEG_QUALITY: u8 = 95;

/// Parses one label line. Anything but five numeric fields with a
/// non-negative integral class id is rejected; geometry is not range checked.
pub fn parse_label_line(line: &str) -> Option<NormalizedBox> {
    let mut fields = line.split_whitespace();

    let class: f64 = fields.next()?.parse().ok()?;
    let mut geom = [0.0f32; 4];
    for v in geom.iter_mut() {
        *v = fields.next()?.parse().ok()?;
    }

    if fields.next().is_some() {
        return None;
    }

    if !class.is_finite() || class < 0.0 || class.fract() != 0.0 || class > u32::MAX as f64 {
        return None;
    }

    if geom.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let [x, y, w, h] = geom;
    Some(NormalizedBox::new(class as u32, x, y, w, h))
}

pub fn format_label_line(bbox: &NormalizedBox) -> String {
    format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        bbox.class_id, bbox.x_center, bbox.y_center, bbox.width, bbox.height
    )
}

/// Reads a label file, silently dropping lines that don't parse.
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Vec<NormalizedBox>, Error> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    Ok(content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let parsed = parse_label_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                log::trace!("{}:{}: dropping label line {:?}", path.display(), idx + 1, line);
            }
            parsed
        })
        .collect())
}

pub fn write_labels<P: AsRef<Path>>(path: P, boxes: &[NormalizedBox]) -> Result<(), Error> {
    let mut out = BufWriter::new(fs::File::create(path)?);

    for bbox in boxes {
        writeln!(out, "{}", format_label_line(bbox))?;
    }

    out.flush()?;
    Ok(())
}

/// Rewrites `input` into `output` with every box mapped through `plan`.
/// Returns the number of boxes written.
pub fn remap_label_file<P, Q>(input: P, output: Q, plan: &ResizePlan) -> Result<usize, Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let boxes: Vec<_> = read_labels(input)?
        .iter()
        .map(|b| map_box(plan, b))
        .collect();

    write_labels(output, &boxes)?;

    Ok(boxes.len())
}

/// Shrinks `img` to fit `target` (never enlarging it) and pastes it centered
/// on a black canvas of exactly `target` size.
pub fn letterbox_image(img: &DynamicImage, target: Size) -> Result<(RgbImage, ResizePlan), Error> {
    let rgb = img.to_rgb8();
    let plan = ResizePlan::thumbnail(Size::new(rgb.width(), rgb.height())?, target);
    let (sw, sh) = plan.scaled_size();

    let mut canvas = RgbImage::new(target.width(), target.height());

    if sw > 0 && sh > 0 {
        let scaled = if (sw, sh) == rgb.dimensions() {
            rgb
        } else {
            imageops::resize(&rgb, sw, sh, FilterType::Lanczos3)
        };

        imageops::replace(&mut canvas, &scaled, plan.pad_x() as i64, plan.pad_y() as i64);
    }

    Ok((canvas, plan))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DatasetReport {
    pub images: usize,
    pub labels: usize,
    pub boxes: usize,
    pub failed: usize,
}

#[inline]
fn is_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg")
    )
}

#[inline]
fn is_jpeg(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("jpg" | "jpeg")
    )
}

fn save_image(img: &RgbImage, path: &Path) -> Result<(), Error> {
    if is_jpeg(path) {
        let mut out = BufWriter::new(fs::File::create(path)?);
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(img)?;
        out.flush()?;
    } else {
        img.save(path)?;
    }

    Ok(())
}

struct SplitDirs {
    in_labels: PathBuf,
    out_images: PathBuf,
    out_labels: PathBuf,
}

/// Letterboxes one image and remaps its label file if there is one.
/// Returns the number of boxes written, `None` without a label file.
fn resize_one(path: &Path, dirs: &SplitDirs, target: Size) -> Result<Option<usize>, Error> {
    let file_name = match path.file_name() {
        Some(name) => name,
        None => return Ok(None),
    };

    let img = image::open(path)?;
    let (canvas, plan) = letterbox_image(&img, target)?;
    save_image(&canvas, &dirs.out_images.join(file_name))?;

    let label_name = Path::new(file_name).with_extension("txt");
    let label_path = dirs.in_labels.join(&label_name);
    if !label_path.exists() {
        return Ok(None);
    }

    remap_label_file(&label_path, dirs.out_labels.join(&label_name), &plan).map(Some)
}

/// Letterboxes every image of `input_root/images` into `output_root/images`
/// and remaps the matching `labels/*.txt`. Failures of single images are
/// logged and counted, they don't abort the run.
pub fn resize_dataset<P, Q>(input_root: P, output_root: Q, target: Size) -> Result<DatasetReport, Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (input_root, output_root) = (input_root.as_ref(), output_root.as_ref());
    let dirs = SplitDirs {
        in_labels: input_root.join("labels"),
        out_images: output_root.join("images"),
        out_labels: output_root.join("labels"),
    };

    fs::create_dir_all(&dirs.out_images)?;
    fs::create_dir_all(&dirs.out_labels)?;

    let mut images: Vec<PathBuf> = fs::read_dir(input_root.join("images"))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    images.sort();

    let mut report = DatasetReport::default();

    for path in &images {
        match resize_one(path, &dirs, target) {
            Ok(boxes) => {
                report.images += 1;
                if let Some(n) = boxes {
                    report.labels += 1;
                    report.boxes += n;
                }
            }
            Err(err) => {
                log::warn!("skipping {}: {}", path.display(), err);
                report.failed += 1;
            }
        }
    }

    log::info!(
        "resized {} images ({} label files, {} boxes), {} failed",
        report.images,
        report.labels,
        report.boxes,
        report.failed
    );

    Ok(report)
}
