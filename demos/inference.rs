use argh::FromArgs;
use std::path::PathBuf;

use candle_core::Device;
use kornia_io::functional as F;
use kornia_yolov5::{ClassNames, YoloV5Config, YoloV5PostProcess};

#[derive(FromArgs)]
/// YOLOv5 post-processing application arguments
struct Args {
    /// path to an input image
    #[argh(option)]
    image_path: PathBuf,

    /// path to a safetensors file holding the raw network output
    #[argh(option)]
    predictions_path: PathBuf,

    /// name of the output tensor in the safetensors file
    #[argh(option, default = "\"output\".to_string()")]
    tensor_name: String,

    /// path to a class names file, one label per line
    #[argh(option)]
    class_names: Option<PathBuf>,

    /// the confidence threshold for the model
    #[argh(option, default = "0.4")]
    confidence_threshold: f32,

    /// the nms threshold for the model
    #[argh(option, default = "0.5")]
    nms_threshold: f32,

    /// the square input size of the model
    #[argh(option, default = "640")]
    input_size: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    let rec = rerun::RecordingStreamBuilder::new("YOLOv5 Post-processing App").spawn()?;

    let class_names = args.class_names.map(ClassNames::from_file).transpose()?;

    let config = YoloV5Config {
        confidence_threshold: args.confidence_threshold,
        score_threshold: args.confidence_threshold,
        nms_threshold: args.nms_threshold,
        input_size: args.input_size,
        num_classes: class_names.as_ref().map_or(80, ClassNames::len),
        use_accelerated_inference: false,
    };

    let postprocess = YoloV5PostProcess::new(config)?;

    // read the image as RGB8
    let image = F::read_image_any(args.image_path)?;

    // read the raw network output
    let tensors = candle_core::safetensors::load(&args.predictions_path, &Device::Cpu)?;
    let pred = tensors
        .get(&args.tensor_name)
        .ok_or_else(|| format!("tensor {} not found", args.tensor_name))?;

    // decode and suppress the predictions
    let detections = postprocess.process_tensor(pred, image.size())?;

    rec.log(
        "image",
        &rerun::Image::from_elements(
            image.as_slice(),
            image.size().into(),
            rerun::ColorModel::RGB,
        ),
    )?;

    let mut boxes_mins = Vec::new();
    let mut boxes_sizes = Vec::new();
    let mut class_ids = Vec::new();
    let mut labels = Vec::new();
    for detection in detections {
        boxes_mins.push((detection.left, detection.top));
        boxes_sizes.push((detection.width(), detection.height()));
        class_ids.push(detection.class as u16);

        let name = class_names
            .as_ref()
            .and_then(|names| names.label_for(&detection))
            .map_or_else(|| detection.class.to_string(), str::to_string);
        labels.push(format!("{name}:{:.2}", detection.confidence));
    }

    rec.log(
        "boxes",
        &rerun::Boxes2D::from_mins_and_sizes(boxes_mins, boxes_sizes)
            .with_class_ids(class_ids)
            .with_labels(labels),
    )?;

    Ok(())
}
