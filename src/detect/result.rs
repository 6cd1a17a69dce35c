/// Axis-aligned box in frame pixel coordinates (`x1,y1` top-left, `x2,y2` bottom-right).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer pixel box. Each coordinate is truncated toward zero.
    pub fn to_pixels(&self) -> PixelBox {
        PixelBox {
            x1: self.x1 as i32,
            y1: self.y1 as i32,
            x2: self.x2 as i32,
            y2: self.y2 as i32,
        }
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Clamp into `[0, width] x [0, height]`.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// Integer box used for depth lookup and drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    /// `(floor((x1+x2)/2), floor((y1+y2)/2))`.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x1 + self.x2).div_euclid(2),
            (self.y1 + self.y2).div_euclid(2),
        )
    }
}

/// One predicted object instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub label: String,
    /// Score in `0..=1`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: usize, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            label: label.into(),
            confidence,
        }
    }

    /// Caption drawn above the box, e.g. `person 0.87`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_floor_of_integer_midpoint() {
        let px = BoundingBox::new(10.9, 20.2, 21.7, 31.0).to_pixels();
        assert_eq!(px, PixelBox { x1: 10, y1: 20, x2: 21, y2: 31 });
        assert_eq!(px.center(), (15, 25));
    }

    #[test]
    fn center_floors_negative_sums() {
        let px = PixelBox { x1: -3, y1: -1, x2: 0, y2: 0 };
        assert_eq!(px.center(), (-2, -1));
    }

    #[test]
    fn center_matches_property_over_grid() {
        for x1 in 0..12 {
            for x2 in x1..20 {
                let px = BoundingBox::new(x1 as f32, 0.0, x2 as f32 + 0.5, 7.0).to_pixels();
                let (cx, cy) = px.center();
                assert_eq!(cx, (x1 + x2) / 2);
                assert_eq!(cy, 3);
            }
        }
    }

    #[test]
    fn caption_formats_two_decimals() {
        let det = Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0, "person", 0.876);
        assert_eq!(det.caption(), "person 0.88");
    }
}
