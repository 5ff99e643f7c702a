use std::collections::BTreeMap;

use kornia_image::ImageSize;
use serde::Serialize;

/// Bounding box struct for candidate boxes in model input space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Minimum x coordinate of the bounding box.
    pub xmin: f32,
    /// Minimum y coordinate of the bounding box.
    pub ymin: f32,
    /// Maximum x coordinate of the bounding box.
    pub xmax: f32,
    /// Maximum y coordinate of the bounding box.
    pub ymax: f32,
    /// Confidence score of the bounding box.
    pub confidence: f32,
    /// Class index of the bounding box.
    pub class: u32,
}

impl BoundingBox {
    /// Build a box from its center and size.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32, confidence: f32, class: u32) -> Self {
        Self {
            xmin: cx - w / 2.0,
            ymin: cy - h / 2.0,
            xmax: cx + w / 2.0,
            ymax: cy + h / 2.0,
            confidence,
            class,
        }
    }

    /// Area of the box, without the inclusive-pixel correction used for intersections.
    pub fn area(&self) -> f32 {
        (self.xmax - self.xmin) * (self.ymax - self.ymin)
    }

    /// Map the box from the square model input to the source image.
    ///
    /// The horizontal and vertical scales are independent since the model input
    /// is a square resize of a possibly non-square image.
    pub fn to_detection(&self, input_size: usize, image_size: ImageSize) -> Detection {
        let input_size = input_size as f32;
        let width = image_size.width as f32;
        let height = image_size.height as f32;
        Detection {
            left: self.xmin / input_size * width,
            top: self.ymin / input_size * height,
            right: self.xmax / input_size * width,
            bottom: self.ymax / input_size * height,
            confidence: self.confidence,
            class: self.class,
        }
    }
}

/// Final detection in source image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Left edge in image pixels.
    pub left: f32,
    /// Top edge in image pixels.
    pub top: f32,
    /// Right edge in image pixels.
    pub right: f32,
    /// Bottom edge in image pixels.
    pub bottom: f32,
    /// Confidence score, objectness times best class score.
    pub confidence: f32,
    /// Class index of the detection.
    pub class: u32,
}

impl Detection {
    /// Width of the detection in image pixels.
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height of the detection in image pixels.
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Intersection over union of two bounding boxes.
///
/// The intersection counts pixels inclusively (`+ 1` on each side) while the
/// box areas do not. A non-positive union yields `0`.
pub fn iou(b1: &BoundingBox, b2: &BoundingBox) -> f32 {
    let i_xmin = b1.xmin.max(b2.xmin);
    let i_xmax = b1.xmax.min(b2.xmax);
    let i_ymin = b1.ymin.max(b2.ymin);
    let i_ymax = b1.ymax.min(b2.ymax);
    let i_area = (i_xmax - i_xmin + 1.).max(0.) * (i_ymax - i_ymin + 1.).max(0.);
    let union = b1.area() + b2.area() - i_area;
    if union <= 0. {
        return 0.;
    }
    i_area / union
}

/// Non-maximum suppression for bounding boxes.
///
/// Boxes are grouped by class and each group is suppressed independently, so
/// boxes of different classes never suppress each other. A box is dropped when
/// its IoU with a kept box of the same class is greater than or equal to
/// `threshold`.
///
/// # Arguments
///
/// * `bboxes` - The candidate boxes, in decode order.
/// * `threshold` - The IoU threshold for suppression.
///
/// # Returns
///
/// The indices of the kept boxes, by descending confidence. Equal confidences
/// keep the lower index first.
pub fn non_maximum_suppression(bboxes: &[BoundingBox], threshold: f32) -> Vec<usize> {
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, bbox) in bboxes.iter().enumerate() {
        groups.entry(bbox.class).or_default().push(index);
    }

    tracing::trace!("suppressing {} boxes in {} classes", bboxes.len(), groups.len());

    #[cfg(feature = "rayon")]
    let kept_per_class: Vec<Vec<usize>> = {
        use rayon::prelude::*;
        groups
            .into_par_iter()
            .map(|(_, pool)| suppress_class(bboxes, pool, threshold))
            .collect()
    };

    #[cfg(not(feature = "rayon"))]
    let kept_per_class: Vec<Vec<usize>> = groups
        .into_values()
        .map(|pool| suppress_class(bboxes, pool, threshold))
        .collect();

    let mut kept: Vec<usize> = kept_per_class.into_iter().flatten().collect();
    sort_by_confidence(bboxes, &mut kept);
    kept
}

/// Greedy suppression over the boxes of a single class.
fn suppress_class(bboxes: &[BoundingBox], mut pool: Vec<usize>, threshold: f32) -> Vec<usize> {
    sort_by_confidence(bboxes, &mut pool);

    let mut kept = Vec::new();
    while !pool.is_empty() {
        let best = pool.remove(0);
        kept.push(best);
        let best_box = &bboxes[best];
        pool.retain(|&index| iou(best_box, &bboxes[index]) < threshold);
    }
    kept
}

/// Sort box handles by descending confidence, ties by ascending index.
fn sort_by_confidence(bboxes: &[BoundingBox], indices: &mut [usize]) {
    indices.sort_by(|&a, &b| {
        bboxes[b]
            .confidence
            .total_cmp(&bboxes[a].confidence)
            .then(a.cmp(&b))
    });
}
