use std::path::Path;

use ab_glyph::FontArc;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::classes::ClassTable;
use crate::error::Error;
use crate::frame::Frame;
use crate::Track;

const CAPTION_GAP: i32 = 10;

/// Consumer of the confirmed tracks of each frame.
pub trait Renderer<T> {
    fn render(&mut self, frame: &mut Frame<T>, tracks: &[Track], classes: &ClassTable);
}

/// Discards everything, for headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl<T> Renderer<T> for NullRenderer {
    #[inline]
    fn render(&mut self, _frame: &mut Frame<T>, _tracks: &[Track], _classes: &ClassTable) {}
}

/// Caption shown next to a track, e.g. `vehicle-12(0.87)`.
pub fn track_label(track: &Track, classes: &ClassTable) -> Option<String> {
    let name = classes.name(track.det_class)?;

    Some(format!("{}-{}({:.2})", name, track.track_id, track.det_confidence))
}

/// Draws track boxes in their class colour straight into the frame, with the
/// track caption above each box once a font is set.
#[derive(Clone)]
pub struct ImageRenderer {
    pub thickness: u32,
    pub font_scale: f32,
    font: Option<FontArc>,
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self {
            thickness: 2,
            font_scale: 16.0,
            font: None,
        }
    }
}

impl ImageRenderer {
    pub fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            ..Self::default()
        }
    }

    /// Reads a TrueType/OpenType font file for the captions.
    pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontArc, Error> {
        Ok(FontArc::try_from_vec(std::fs::read(path)?)?)
    }
}

impl Renderer<RgbImage> for ImageRenderer {
    fn render(&mut self, frame: &mut Frame<RgbImage>, tracks: &[Track], classes: &ClassTable) {
        for track in tracks {
            let color = match classes.color(track.det_class) {
                Some(color) => Rgb(color),
                None => continue,
            };

            let b = &track.last_box_ltrb;
            let (left, top) = (b.left().round() as i32, b.top().round() as i32);
            let width = (b.right() - b.left()).round().max(1.0) as u32;
            let height = (b.bottom() - b.top()).round().max(1.0) as u32;

            // grow outwards so the inner edge stays on the box
            for i in 0..self.thickness.max(1) {
                let rect = Rect::at(left - i as i32, top - i as i32)
                    .of_size(width + 1 + 2 * i, height + 1 + 2 * i);
                draw_hollow_rect_mut(&mut frame.data, rect, color);
            }

            if let (Some(font), Some(label)) = (&self.font, track_label(track, classes)) {
                let y = top - CAPTION_GAP - self.font_scale.round() as i32;
                draw_text_mut(&mut frame.data, color, left, y, self.font_scale, font, &label);
            }
        }
    }
}
