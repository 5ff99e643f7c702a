#![deny(missing_docs)]

//! YOLOv5 post-processing in Rust
//!
//! This crate turns the raw `[1, N, 5 + C]` output of a YOLOv5 network into a
//! ranked list of detections in source image coordinates: anchor decoding,
//! per-class non-maximum suppression and coordinate remapping.
//!
//! # Examples
//!
//! ```no_run
//! use kornia_image::ImageSize;
//! use kornia_yolov5::{YoloV5Config, YoloV5PostProcess};
//!
//! let postprocess = YoloV5PostProcess::new(YoloV5Config::default())
//!     .expect("Failed to create the post-processor");
//!
//! // the raw output of the network, 85 values per anchor
//! let output: Vec<f32> = vec![0.0; 25200 * 85];
//!
//! let image_size = ImageSize { width: 1280, height: 720 };
//! let detections = postprocess
//!     .process_slice(&output, image_size)
//!     .expect("Failed to post-process");
//! for detection in detections {
//!     println!("Detection: {:?}", detection);
//! }
//! ```

/// Bounding boxes, IoU and non-maximum suppression
mod bounding_box;

/// Class label lists
mod class_names;

/// Raw prediction decoding
mod decoder;

/// Error types
mod error;

/// YOLOv5 high level interface
mod yolov5;

pub use bounding_box::{BoundingBox, Detection, iou, non_maximum_suppression};
pub use class_names::ClassNames;
pub use decoder::{BOX_ATTRIBUTES, Decoder, RawPredictions};
pub use error::{Result, YoloV5Error};
pub use yolov5::{InferenceEngine, YoloV5, YoloV5Config, YoloV5PostProcess, preprocess_image};
