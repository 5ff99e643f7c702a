use super::{
    bounding_box::BoundingBox,
    error::{Result, YoloV5Error},
};

/// Number of leading attributes per anchor: `cx, cy, w, h, objectness`.
pub const BOX_ATTRIBUTES: usize = 5;

/// Borrowed view over a raw `[1, N, 5 + C]` prediction buffer.
///
/// The shape is checked once at construction, so rows can be read without
/// further bounds checks.
#[derive(Debug, Clone, Copy)]
pub struct RawPredictions<'a> {
    data: &'a [f32],
    num_anchors: usize,
    num_classes: usize,
}

impl<'a> RawPredictions<'a> {
    /// Create a view over `num_anchors` rows of `5 + num_classes` attributes.
    pub fn new(data: &'a [f32], num_anchors: usize, num_classes: usize) -> Result<Self> {
        let num_attributes = attributes_for(num_classes)?;
        let expected = num_anchors.checked_mul(num_attributes).ok_or_else(|| {
            YoloV5Error::InvalidShape {
                expected: format!("{num_anchors}x{num_attributes} values"),
                actual: "a length overflowing usize".to_string(),
            }
        })?;
        if data.len() != expected {
            return Err(YoloV5Error::InvalidShape {
                expected: format!("{num_anchors}x{num_attributes} = {expected} values"),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            data,
            num_anchors,
            num_classes,
        })
    }

    /// Create a view inferring the anchor count from the buffer length.
    pub fn from_flat(data: &'a [f32], num_classes: usize) -> Result<Self> {
        let num_attributes = attributes_for(num_classes)?;
        if data.len() % num_attributes != 0 {
            return Err(YoloV5Error::InvalidShape {
                expected: format!("a multiple of {num_attributes} values"),
                actual: format!("{} values", data.len()),
            });
        }
        Self::new(data, data.len() / num_attributes, num_classes)
    }

    /// Number of anchor rows.
    pub fn num_anchors(&self) -> usize {
        self.num_anchors
    }

    /// Number of class scores per row.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Number of attributes per row.
    pub fn num_attributes(&self) -> usize {
        BOX_ATTRIBUTES + self.num_classes
    }

    /// Iterate over the anchor rows.
    pub fn rows(&self) -> std::slice::ChunksExact<'a, f32> {
        self.data.chunks_exact(BOX_ATTRIBUTES + self.num_classes)
    }
}

fn attributes_for(num_classes: usize) -> Result<usize> {
    if num_classes == 0 {
        return Err(YoloV5Error::InvalidShape {
            expected: "at least one class score per anchor".to_string(),
            actual: "0 classes".to_string(),
        });
    }
    BOX_ATTRIBUTES
        .checked_add(num_classes)
        .ok_or_else(|| YoloV5Error::InvalidShape {
            expected: "an attribute count fitting in usize".to_string(),
            actual: format!("{num_classes} classes"),
        })
}

/// Converts raw anchor rows into scored candidate boxes.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    /// Rows with objectness at or below this value are skipped.
    pub objectness_threshold: f32,
    /// Candidates with confidence at or below this value are skipped.
    pub score_threshold: f32,
}

impl Decoder {
    /// Create a new decoder.
    pub fn new(objectness_threshold: f32, score_threshold: f32) -> Self {
        Self {
            objectness_threshold,
            score_threshold,
        }
    }

    /// Decode all rows into candidate boxes, in row order.
    pub fn decode(&self, raw: &RawPredictions<'_>) -> Vec<BoundingBox> {
        raw.rows().filter_map(|row| self.decode_row(row)).collect()
    }

    /// Decode a single row of `5 + C` attributes.
    fn decode_row(&self, row: &[f32]) -> Option<BoundingBox> {
        let objectness = row[4];
        // cheap filter before scanning the class scores
        if !above(objectness, self.objectness_threshold) {
            return None;
        }

        let (class_index, class_score) = best_class(&row[BOX_ATTRIBUTES..])?;
        let confidence = objectness * class_score;
        if !above(confidence, self.score_threshold) {
            return None;
        }

        Some(BoundingBox::from_center(
            row[0],
            row[1],
            row[2],
            row[3],
            confidence,
            class_index as u32,
        ))
    }
}

/// Strictly above the threshold. NaN never passes.
fn above(value: f32, threshold: f32) -> bool {
    value > threshold
}

/// Linear max over class scores, the first of equal maxima wins.
fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
    let (&first, rest) = scores.split_first()?;
    let mut best = (0, first);
    for (i, &score) in rest.iter().enumerate() {
        if score > best.1 {
            best = (i + 1, score);
        }
    }
    Some(best)
}
