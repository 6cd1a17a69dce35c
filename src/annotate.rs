//! Depth lookup and annotation.
//!
//! For every detection the annotator truncates the box to integer pixels, takes
//! the floor midpoint as the object center and, when a depth frame is present,
//! reads the distance there. Boxes, captions and distance text are drawn onto an
//! RGB copy of the frame resized to the fixed output resolution.

use image::{Rgb, RgbImage};

use crate::detect::Detection;
use crate::frame::{fit_to, ColorFrame, DepthFrame};
use crate::overlay::{draw_rect, draw_text, fill_rect, text_size};
use crate::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// Vertical offset of the distance text above the box, in output pixels.
pub const DISTANCE_TEXT_OFFSET: i32 = 20;
pub const DISTANCE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CAPTION_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const PALETTE: [Rgb<u8>; 10] = [
    Rgb([4, 42, 255]),
    Rgb([11, 219, 235]),
    Rgb([243, 243, 243]),
    Rgb([0, 223, 183]),
    Rgb([17, 31, 104]),
    Rgb([255, 111, 221]),
    Rgb([255, 68, 79]),
    Rgb([204, 237, 0]),
    Rgb([0, 243, 68]),
    Rgb([189, 0, 255]),
];

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatorConfig {
    pub output_width: u32,
    pub output_height: u32,
    pub box_thickness: u32,
    pub caption_scale: u32,
    pub distance_scale: u32,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            output_width: DEFAULT_WIDTH,
            output_height: DEFAULT_HEIGHT,
            box_thickness: 2,
            caption_scale: 1,
            distance_scale: 2,
        }
    }
}

/// Per-object result of the depth lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectReading {
    pub label: String,
    pub confidence: f32,
    /// Center in source frame pixels.
    pub center: (i32, i32),
    /// Meters, exactly as reported by the depth frame. `None` without depth.
    pub distance_m: Option<f32>,
}

impl ObjectReading {
    /// Distance text as drawn on the frame, e.g. `1.32m`.
    pub fn distance_text(&self) -> Option<String> {
        self.distance_m.map(|d| format!("{:.2}m", d))
    }
}

/// Annotated output frame plus the readings drawn on it.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub image: RgbImage,
    pub readings: Vec<ObjectReading>,
}

#[derive(Clone, Debug, Default)]
pub struct Annotator {
    config: AnnotatorConfig,
}

impl Annotator {
    pub fn new(config: AnnotatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// Resize and color-convert `color` into a fresh output frame, no overlays.
    pub fn base_image(&self, color: &ColorFrame) -> RgbImage {
        fit_to(
            &color.to_rgb_image(),
            self.config.output_width,
            self.config.output_height,
        )
    }

    /// Draw every detection, with distance text wherever depth is available.
    pub fn annotate(
        &self,
        color: &ColorFrame,
        depth: Option<&DepthFrame>,
        detections: &[Detection],
    ) -> Annotation {
        let mut image = self.base_image(color);
        let sx = self.config.output_width as f32 / color.width.max(1) as f32;
        let sy = self.config.output_height as f32 / color.height.max(1) as f32;

        let mut readings = Vec::with_capacity(detections.len());
        for det in detections {
            let px = det.bbox.to_pixels();
            let center = px.center();
            let distance_m = depth.map(|d| d.distance(center.0, center.1));

            let (x1, y1) = ((px.x1 as f32 * sx) as i32, (px.y1 as f32 * sy) as i32);
            let (x2, y2) = ((px.x2 as f32 * sx) as i32, (px.y2 as f32 * sy) as i32);
            let color = PALETTE[det.class_id % PALETTE.len()];
            draw_rect(&mut image, x1, y1, x2, y2, color, self.config.box_thickness);
            self.draw_caption(&mut image, x1, y1, &det.caption(), color);

            let reading = ObjectReading {
                label: det.label.clone(),
                confidence: det.confidence,
                center,
                distance_m,
            };
            if let Some(text) = reading.distance_text() {
                let (_, h) = text_size(&text, self.config.distance_scale);
                // Text baseline sits DISTANCE_TEXT_OFFSET above the box top.
                let top = y1 - DISTANCE_TEXT_OFFSET - h as i32;
                draw_text(&mut image, x1, top, &text, DISTANCE_COLOR, self.config.distance_scale);
            }
            readings.push(reading);
        }

        Annotation { image, readings }
    }

    fn draw_caption(&self, image: &mut RgbImage, x1: i32, y1: i32, caption: &str, color: Rgb<u8>) {
        let scale = self.config.caption_scale;
        let (w, h) = text_size(caption, scale);
        let pad = 2;
        let tab_h = h as i32 + pad * 2;
        // Flip inside the box when there is no room above it.
        let top = if y1 - tab_h >= 0 { y1 - tab_h } else { y1 };
        fill_rect(image, x1, top, x1 + w as i32 + pad * 2, top + tab_h, color);
        draw_text(image, x1 + pad, top + pad, caption, CAPTION_TEXT_COLOR, scale);
    }
}
