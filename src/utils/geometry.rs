use serde::{Deserialize, Serialize};

/// Axis-aligned box in normalized image coordinates, origin top-left.
/// Width and height are required to be positive; detections that come in
/// with a zero-area box are discarded before they reach this type's math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Convert a pixel-space box to normalized coordinates.
    pub fn from_pixels(x: f64, y: f64, w: f64, h: f64, img_w: f64, img_h: f64) -> Self {
        Self {
            x: x / img_w,
            y: y / img_h,
            w: w / img_w,
            h: h / img_h,
        }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

/// Intersection-over-union of two normalized boxes.
///
/// Returns 0 for disjoint boxes and 1 for identical ones. The intersection
/// rectangle is clamped to non-negative extent before its area is taken.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    inter / (a.area() + b.area() - inter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_boxes() {
        let a = BoundingBox::new(0.1, 0.2, 0.3, 0.4);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 0.1, 0.1);
        let b = BoundingBox::new(0.5, 0.5, 0.1, 0.1);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = BoundingBox::new(0.1, 0.1, 0.4, 0.4);
        let b = BoundingBox::new(0.3, 0.3, 0.4, 0.4);
        let ab = iou(&a, &b);
        let ba = iou(&b, &a);
        assert!(ab > 0.0);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_iou_touching_edges_is_zero() {
        // Boxes sharing only an edge have zero intersection area.
        let a = BoundingBox::new(0.0, 0.0, 0.2, 0.2);
        let b = BoundingBox::new(0.2, 0.0, 0.2, 0.2);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        // Two unit-square halves overlapping by half of each: inter=0.5*1,
        // union=1.5 -> IoU = 1/3.
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(0.5, 0.0, 1.0, 1.0);
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_pixels_normalizes() {
        let b = BoundingBox::from_pixels(100.0, 50.0, 200.0, 100.0, 1000.0, 500.0);
        assert_eq!(b, BoundingBox::new(0.1, 0.1, 0.2, 0.2));
    }
}
