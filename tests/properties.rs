use kornia_image::ImageSize;
use kornia_yolov5::{
    BoundingBox, Decoder, RawPredictions, YoloV5Config, YoloV5PostProcess, iou,
    non_maximum_suppression,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const NUM_CLASSES: usize = 3;

fn square_image() -> ImageSize {
    ImageSize {
        width: 640,
        height: 640,
    }
}

/// Clustered anchors so that suppression has work to do.
fn random_predictions(rng: &mut StdRng, num_anchors: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(num_anchors * (5 + NUM_CLASSES));
    for _ in 0..num_anchors {
        let cluster = rng.random_range(0..4) as f32;
        data.push(100.0 + cluster * 120.0 + rng.random_range(-8.0..8.0));
        data.push(100.0 + cluster * 100.0 + rng.random_range(-8.0..8.0));
        data.push(rng.random_range(20.0..60.0));
        data.push(rng.random_range(20.0..60.0));
        data.push(rng.random::<f32>());
        for _ in 0..NUM_CLASSES {
            data.push(rng.random::<f32>());
        }
    }
    data
}

fn decode(data: &[f32]) -> Vec<BoundingBox> {
    let raw = RawPredictions::from_flat(data, NUM_CLASSES).expect("valid shape");
    Decoder::new(0.4, 0.4).decode(&raw)
}

#[test]
fn kept_boxes_are_sorted_and_disjoint_within_class() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let candidates = decode(&random_predictions(&mut rng, 200));
        let kept = non_maximum_suppression(&candidates, 0.5);
        assert!(!kept.is_empty());

        for pair in kept.windows(2) {
            assert!(candidates[pair[0]].confidence >= candidates[pair[1]].confidence);
        }

        for (i, &a) in kept.iter().enumerate() {
            for &b in &kept[i + 1..] {
                if candidates[a].class == candidates[b].class {
                    assert!(iou(&candidates[a], &candidates[b]) < 0.5);
                }
            }
        }
    }
}

#[test]
fn suppression_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let candidates = decode(&random_predictions(&mut rng, 200));
        let kept = non_maximum_suppression(&candidates, 0.5);

        let survivors: Vec<BoundingBox> = kept.iter().map(|&i| candidates[i]).collect();
        let again = non_maximum_suppression(&survivors, 0.5);

        assert_eq!(again, (0..survivors.len()).collect::<Vec<_>>());
    }
}

#[test]
fn overlapping_boxes_of_different_classes_are_kept() {
    let a = BoundingBox::from_center(50.0, 50.0, 20.0, 20.0, 0.9, 0);
    let b = BoundingBox::from_center(50.0, 50.0, 20.0, 20.0, 0.8, 1);
    assert!(iou(&a, &b) >= 1.0);

    assert_eq!(non_maximum_suppression(&[a, b], 0.5), vec![0, 1]);
}

#[test]
fn equal_confidences_keep_decode_order() {
    let boxes: Vec<BoundingBox> = (0..5)
        .map(|i| BoundingBox::from_center(i as f32 * 100.0, 0.0, 10.0, 10.0, 0.7, i % 2))
        .collect();

    assert_eq!(non_maximum_suppression(&boxes, 0.5), vec![0, 1, 2, 3, 4]);
}

#[test]
fn near_duplicate_keeps_highest_confidence() -> kornia_yolov5::Result<()> {
    let postprocess = YoloV5PostProcess::new(YoloV5Config {
        num_classes: 2,
        nms_threshold: 0.5,
        ..Default::default()
    })?;
    #[rustfmt::skip]
    let data = [
        200.0f32, 200.0, 50.0, 50.0, 1.0, 0.6, 0.0,
        201.0, 200.0, 50.0, 50.0, 1.0, 0.8, 0.0,
    ];

    let detections = postprocess.process_slice(&data, square_image())?;

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].confidence, 0.8);
    assert!((detections[0].left - 176.0).abs() < 1e-3);
    Ok(())
}

#[test]
fn confidence_at_threshold_is_discarded() -> kornia_yolov5::Result<()> {
    let postprocess = YoloV5PostProcess::new(YoloV5Config {
        num_classes: 1,
        confidence_threshold: 0.25,
        score_threshold: 0.25,
        ..Default::default()
    })?;

    let at_threshold = [10.0f32, 10.0, 4.0, 4.0, 0.5, 0.5];
    assert!(postprocess.process_slice(&at_threshold, square_image())?.is_empty());

    let above_threshold = [10.0f32, 10.0, 4.0, 4.0, 0.5, 0.75];
    assert_eq!(postprocess.process_slice(&above_threshold, square_image())?.len(), 1);
    Ok(())
}

#[test]
fn empty_output_is_not_an_error() -> kornia_yolov5::Result<()> {
    let postprocess = YoloV5PostProcess::new(YoloV5Config::default())?;
    assert!(postprocess.process_slice(&[], square_image())?.is_empty());

    let below = vec![0.0f32; 10 * 85];
    assert!(postprocess.process_slice(&below, square_image())?.is_empty());
    Ok(())
}

#[test]
fn malformed_output_is_rejected() -> kornia_yolov5::Result<()> {
    let postprocess = YoloV5PostProcess::new(YoloV5Config::default())?;
    assert!(matches!(
        postprocess.process_slice(&[0.0f32; 84], square_image()),
        Err(kornia_yolov5::YoloV5Error::InvalidShape { .. })
    ));
    Ok(())
}
