//! YOLOv8 output decoding and non-maximum suppression.
//!
//! YOLOv8 detection heads export a single `[1, 4 + classes, anchors]` tensor.
//! Rows 0..4 hold the box as center x, center y, width, height in model input
//! pixels; the remaining rows hold per-class scores (already sigmoid-activated).

use anyhow::{anyhow, Result};
use std::cmp::Ordering;

use super::labels::{class_label, ClassNames};
use super::result::{BoundingBox, Detection};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
pub const MAX_DETECTIONS: usize = 300;

/// Candidate box before suppression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub score: f32,
}

/// Maps model input coordinates back onto the source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputScale {
    pub x: f32,
    pub y: f32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl InputScale {
    pub fn new(frame_width: u32, frame_height: u32, input_width: u32, input_height: u32) -> Self {
        Self {
            x: frame_width as f32 / input_width as f32,
            y: frame_height as f32 / input_height as f32,
            frame_width,
            frame_height,
        }
    }
}

/// Decode a channel-major `[4 + classes, anchors]` slice into scored candidates.
pub fn decode_yolov8(
    output: &[f32],
    channels: usize,
    anchors: usize,
    confidence_threshold: f32,
    scale: InputScale,
) -> Result<Vec<Candidate>> {
    if channels <= 4 {
        return Err(anyhow!("YOLOv8 output needs more than 4 channels, got {}", channels));
    }
    let expected = channels
        .checked_mul(anchors)
        .ok_or_else(|| anyhow!("output dimensions overflow"))?;
    if output.len() != expected {
        return Err(anyhow!(
            "output length mismatch: expected {}, got {}",
            expected,
            output.len()
        ));
    }

    let at = |row: usize, anchor: usize| output[row * anchors + anchor];
    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..channels)
            .map(|row| (row - 4, at(row, anchor)))
            .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if score.is_nan() || score < confidence_threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let bbox = BoundingBox::new(
            (cx - w / 2.0) * scale.x,
            (cy - h / 2.0) * scale.y,
            (cx + w / 2.0) * scale.x,
            (cy + h / 2.0) * scale.y,
        )
        .clamped(scale.frame_width, scale.frame_height);
        candidates.push(Candidate {
            bbox,
            class_id,
            score,
        });
    }
    Ok(candidates)
}

/// Class-aware NMS. Returns survivors ordered by descending score.
pub fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<Candidate> = Vec::new();
    for cand in candidates {
        if keep.len() >= max_detections {
            break;
        }
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == cand.class_id && iou(&k.bbox, &cand.bbox) > iou_threshold);
        if !suppressed {
            keep.push(cand);
        }
    }
    keep
}

/// Intersection over union of two boxes.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x0 = a.x1.max(b.x1);
    let y0 = a.y1.max(b.y1);
    let x1 = a.x2.min(b.x2);
    let y1 = a.y2.min(b.y2);
    let inter = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Attach labels to surviving candidates.
///
/// Uses the model's own class names when it ships them, COCO otherwise.
pub fn into_detections(candidates: Vec<Candidate>, names: Option<&ClassNames>) -> Vec<Detection> {
    candidates
        .into_iter()
        .map(|c| {
            let label = match names {
                Some(names) => names.label(c.class_id),
                None => class_label(c.class_id),
            };
            Detection::new(c.bbox, c.class_id, label, c.score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x1: f32, y1: f32, x2: f32, y2: f32, class_id: usize, score: f32) -> Candidate {
        Candidate {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            class_id,
            score,
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &b), 0.0);
        let half = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((iou(&a, &half) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_best_per_class() {
        let kept = non_max_suppression(
            vec![
                cand(0.0, 0.0, 10.0, 10.0, 0, 0.6),
                cand(1.0, 1.0, 10.0, 10.0, 0, 0.9),
                cand(1.0, 1.0, 10.0, 10.0, 1, 0.5),
                cand(50.0, 50.0, 60.0, 60.0, 0, 0.4),
            ],
            DEFAULT_IOU_THRESHOLD,
            MAX_DETECTIONS,
        );
        let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.4]);
    }

    #[test]
    fn nms_respects_max_detections() {
        let many = (0..10)
            .map(|i| cand(i as f32 * 20.0, 0.0, i as f32 * 20.0 + 5.0, 5.0, 0, 0.5))
            .collect();
        assert_eq!(non_max_suppression(many, 0.5, 3).len(), 3);
    }

    #[test]
    fn decode_picks_best_class_and_rescales() -> Result<()> {
        // 2 classes, 2 anchors; channel-major layout.
        let output = vec![
            320.0, 10.0, // cx
            320.0, 10.0, // cy
            64.0, 4.0, // w
            64.0, 4.0, // h
            0.1, 0.05, // class 0
            0.8, 0.1, // class 1
        ];
        let scale = InputScale::new(640, 480, 640, 640);
        let cands = decode_yolov8(&output, 6, 2, DEFAULT_CONFIDENCE_THRESHOLD, scale)?;
        assert_eq!(cands.len(), 1);
        let c = cands[0];
        assert_eq!(c.class_id, 1);
        assert!((c.score - 0.8).abs() < 1e-6);
        assert!((c.bbox.x1 - 288.0).abs() < 1e-4);
        assert!((c.bbox.x2 - 352.0).abs() < 1e-4);
        assert!((c.bbox.y1 - 216.0).abs() < 1e-4);
        assert!((c.bbox.y2 - 264.0).abs() < 1e-4);

        let dets = into_detections(cands, None);
        assert_eq!(dets[0].label, "bicycle");
        Ok(())
    }

    #[test]
    fn decode_uses_model_class_names() -> Result<()> {
        // Two-class custom model, one anchor: [cx, cy, w, h, cone, cube].
        let output = vec![100.0, 100.0, 20.0, 20.0, 0.9, 0.1];
        let scale = InputScale::new(640, 640, 640, 640);
        let cands = decode_yolov8(&output, 6, 1, DEFAULT_CONFIDENCE_THRESHOLD, scale)?;
        let names = ClassNames::from_metadata("{0: 'cone', 1: 'cube'}").expect("names");

        let dets = into_detections(cands.clone(), Some(&names));
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 0);
        assert_eq!(dets[0].label, "cone");
        assert_eq!(dets[0].caption(), "cone 0.90");

        assert_eq!(into_detections(cands, None)[0].label, "person");
        Ok(())
    }

    #[test]
    fn decode_rejects_malformed_output() {
        let scale = InputScale::new(640, 480, 640, 640);
        assert!(decode_yolov8(&[0.0; 8], 4, 2, 0.25, scale).is_err());
        assert!(decode_yolov8(&[0.0; 11], 6, 2, 0.25, scale).is_err());
    }
}
