use super::{
    bounding_box::{Detection, non_maximum_suppression},
    decoder::{BOX_ATTRIBUTES, Decoder, RawPredictions},
    error::{Result, YoloV5Error},
};
use candle_core::{DType, Device, Tensor};
use kornia_image::{Image, ImageSize};
use serde::{Deserialize, Serialize};

/// YOLOv5 configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloV5Config {
    /// Anchors with objectness at or below this value are discarded
    pub confidence_threshold: f32,
    /// Candidates with objectness times class score at or below this value are discarded
    pub score_threshold: f32,
    /// The non-maximum suppression IoU threshold
    pub nms_threshold: f32,
    /// Edge length of the square model input
    pub input_size: usize,
    /// Number of class scores per anchor
    pub num_classes: usize,
    /// Whether to run the model on an accelerator when one is available
    pub use_accelerated_inference: bool,
}

/// Default configuration for YOLOv5.
impl Default for YoloV5Config {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            score_threshold: 0.4,
            nms_threshold: 0.5,
            input_size: 640,
            num_classes: 80,
            use_accelerated_inference: false,
        }
    }
}

impl YoloV5Config {
    /// Check that all values are in range.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("score_threshold", self.score_threshold),
            ("nms_threshold", self.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(YoloV5Error::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.input_size == 0 {
            return Err(YoloV5Error::InvalidConfig("input_size must be positive".to_string()));
        }
        if self.num_classes == 0 {
            return Err(YoloV5Error::InvalidConfig("num_classes must be positive".to_string()));
        }
        Ok(())
    }

    /// The device model inputs are created on.
    pub fn device(&self) -> Result<Device> {
        if self.use_accelerated_inference {
            Ok(Device::cuda_if_available(0)?)
        } else {
            Ok(Device::Cpu)
        }
    }
}

/// Per-frame post-processing: decode, suppress and remap to image coordinates.
#[derive(Debug, Clone)]
pub struct YoloV5PostProcess {
    config: YoloV5Config,
    decoder: Decoder,
}

impl YoloV5PostProcess {
    /// Create a new post-processor from a validated configuration.
    pub fn new(config: YoloV5Config) -> Result<Self> {
        config.validate()?;
        let decoder = Decoder::new(config.confidence_threshold, config.score_threshold);
        Ok(Self { config, decoder })
    }

    /// The configuration in use.
    pub fn config(&self) -> &YoloV5Config {
        &self.config
    }

    /// Post-process a raw prediction view for an image of `image_size`.
    ///
    /// The detections are sorted by descending confidence.
    pub fn process(
        &self,
        raw: &RawPredictions<'_>,
        image_size: ImageSize,
    ) -> Result<Vec<Detection>> {
        if raw.num_classes() != self.config.num_classes {
            return Err(YoloV5Error::InvalidShape {
                expected: format!("{} class scores", self.config.num_classes),
                actual: format!("{} class scores", raw.num_classes()),
            });
        }

        let candidates = self.decoder.decode(raw);
        let kept = non_maximum_suppression(&candidates, self.config.nms_threshold);

        tracing::debug!(
            "decoded {} anchors into {} candidates, kept {}",
            raw.num_anchors(),
            candidates.len(),
            kept.len()
        );

        Ok(kept
            .into_iter()
            .map(|index| candidates[index].to_detection(self.config.input_size, image_size))
            .collect())
    }

    /// Post-process a flat row-major buffer of `N x (5 + C)` values.
    pub fn process_slice(&self, data: &[f32], image_size: ImageSize) -> Result<Vec<Detection>> {
        let raw = RawPredictions::from_flat(data, self.config.num_classes)?;
        self.process(&raw, image_size)
    }

    /// Post-process a `[1, N, 5 + C]` or `[N, 5 + C]` prediction tensor.
    pub fn process_tensor(&self, pred: &Tensor, image_size: ImageSize) -> Result<Vec<Detection>> {
        let num_attributes = BOX_ATTRIBUTES.saturating_add(self.config.num_classes);
        let pred = match pred.dims() {
            [1, _, _] => pred.squeeze(0)?,
            [_, _] => pred.clone(),
            dims => {
                return Err(YoloV5Error::InvalidShape {
                    expected: format!("[1, N, {num_attributes}]"),
                    actual: format!("{dims:?}"),
                });
            }
        };

        let (num_anchors, pred_size) = pred.dims2()?;
        if pred_size != num_attributes {
            return Err(YoloV5Error::InvalidShape {
                expected: format!("[1, N, {num_attributes}]"),
                actual: format!("[1, {num_anchors}, {pred_size}]"),
            });
        }

        let data = pred.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        let raw = RawPredictions::new(&data, num_anchors, self.config.num_classes)?;
        self.process(&raw, image_size)
    }
}

/// The network that maps a preprocessed image tensor to raw predictions.
pub trait InferenceEngine {
    /// Run the network on a `[1, 3, S, S]` input and return its `[1, N, 5 + C]` output.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;
}

impl<F> InferenceEngine for F
where
    F: Fn(&Tensor) -> Result<Tensor>,
{
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self(input)
    }
}

/// YOLOv5 high level interface.
pub struct YoloV5<E> {
    postprocess: YoloV5PostProcess,
    device: Device,
    engine: E,
}

impl<E: InferenceEngine> YoloV5<E> {
    /// Create a new YOLOv5 instance around an inference engine
    pub fn new(config: YoloV5Config, engine: E) -> Result<Self> {
        let device = config.device()?;
        let postprocess = YoloV5PostProcess::new(config)?;
        Ok(Self {
            postprocess,
            device,
            engine,
        })
    }

    /// The post-processing stage.
    pub fn postprocess(&self) -> &YoloV5PostProcess {
        &self.postprocess
    }

    /// Perform inference on an rgb8 image
    pub fn inference(&self, image: &Image<u8, 3>) -> Result<Vec<Detection>> {
        // preprocess the image
        let image_t =
            preprocess_image(image, self.postprocess.config().input_size, &self.device)?;

        // forward the image
        let pred = self.engine.forward(&image_t)?;

        // postprocess the predictions
        self.postprocess.process_tensor(&pred, image.size())
    }
}

/// Resize an rgb8 image to the square model input and lay it out as `[1, 3, S, S]`.
///
/// Pixel values are scaled to `[0, 1]`.
pub fn preprocess_image(
    image: &Image<u8, 3>,
    input_size: usize,
    device: &Device,
) -> Result<Tensor> {
    let size = ImageSize {
        width: input_size,
        height: input_size,
    };

    let mut image_resized = Image::from_size_val(size, 0)?;
    kornia_imgproc::resize::resize_fast(
        image,
        &mut image_resized,
        kornia_imgproc::interpolation::InterpolationMode::Bilinear,
    )?;

    let image_resized = image_resized.map(|&x| x as f32 / 255.0);

    let image_t =
        Tensor::from_vec::<_, f32>(image_resized.into_vec(), (input_size, input_size, 3), device)?
            .permute((2, 0, 1))?
            .unsqueeze(0)?;

    Ok(image_t)
}
