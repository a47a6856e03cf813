mod common;

use common::{create_corpus, record};
use image::{DynamicImage, Rgb, RgbImage};
use shelfcheck::error::DetectionError;
use shelfcheck::render::{
    BOX_COLOR, annotate, compliance_line, count_line, record_view, save_annotated, summary_line,
};
use shelfcheck::scanner::{ScanOptions, scan};
use shelfcheck::{RawDetection, aggregate, normalize};

fn boxed_record(left: f32, top: f32, right: f32, bottom: f32, confidence: f32) -> shelfcheck::DetectionRecord {
    let base = record("store_a", "shelf.jpg", &[]);
    let raw = vec![RawDetection {
        left,
        top,
        right,
        bottom,
        class_id: 0,
        label: "clipstrip".to_string(),
        confidence,
    }];
    normalize::normalize(base.image().clone(), 0.25, raw)
}

#[test]
fn boxes_are_drawn_in_red_on_a_copy() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 80, Rgb([0, 0, 0])));
    let rec = boxed_record(20.0, 30.0, 60.0, 70.0, 0.8);

    let annotated = annotate(&source, &rec);

    assert_eq!(*annotated.image.get_pixel(20, 30), BOX_COLOR);
    assert_eq!(*annotated.image.get_pixel(40, 30), BOX_COLOR);
    assert_eq!(*annotated.image.get_pixel(18, 50), BOX_COLOR);
    assert_eq!(*annotated.image.get_pixel(40, 50), Rgb([0, 0, 0]));
    assert_eq!(source.to_rgb8().get_pixel(20, 30), &Rgb([0, 0, 0]));
}

#[test]
fn captions_sit_above_each_box() {
    let source = DynamicImage::ImageRgb8(RgbImage::new(100, 80));
    let rec = boxed_record(20.0, 30.0, 60.0, 70.0, 0.8);

    let annotated = annotate(&source, &rec);

    assert_eq!(annotated.captions.len(), 1);
    assert_eq!(annotated.captions[0].text, "clipstrip 0.80");
    assert_eq!((annotated.captions[0].x, annotated.captions[0].y), (20, 15));
}

#[test]
fn boxes_outside_the_image_do_not_panic() {
    let source = DynamicImage::ImageRgb8(RgbImage::new(20, 20));
    let rec = boxed_record(-10.0, -10.0, 50.0, 50.0, 0.5);

    let annotated = annotate(&source, &rec);
    assert_eq!(annotated.image.dimensions(), (20, 20));
}

#[test]
fn enormous_boxes_are_clamped_before_drawing() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([0, 0, 0])));
    let wide = boxed_record(-1e12, -5.0, 1e12, 30.0, 0.9);

    let annotated = annotate(&source, &wide);

    // Only the bottom edge falls inside the image.
    assert_eq!(*annotated.image.get_pixel(10, 29), BOX_COLOR);
    assert_eq!(*annotated.image.get_pixel(10, 20), Rgb([0, 0, 0]));
    assert_eq!(*annotated.image.get_pixel(0, 20), Rgb([0, 0, 0]));

    let offscreen = boxed_record(1e9, 1e9, 2e9, 2e9, 0.9);
    let annotated = annotate(&source, &offscreen);
    assert!(annotated.image.pixels().all(|p| *p == Rgb([0, 0, 0])));
}

#[test]
fn compliance_lines_cover_every_status() {
    let compliant = record("store_a", "a.jpg", &[0.5, 0.7]);
    let empty = record("store_a", "b.jpg", &[]);
    let error = DetectionError {
        path: "store_a/c.jpg".into(),
        reason: "truncated file".to_string(),
    };
    let failed = normalize::normalize_failure(empty.image().clone(), 0.25, &error);

    assert_eq!(
        compliance_line(&compliant, "clipstrip"),
        "Compliant (clipstrip detected, avg conf 0.60)"
    );
    assert_eq!(
        compliance_line(&empty, "clipstrip"),
        "Non-compliant (no clipstrip found)"
    );
    assert_eq!(
        compliance_line(&failed, "clipstrip"),
        "Needs review (detection failed: truncated file)"
    );
    assert_eq!(count_line(&compliant, "clipstrip"), "2 clipstrip(s) detected");

    let view = record_view(&failed, "clipstrip");
    assert!(view.needs_review);
    assert!(!view.compliant);
    assert_eq!(view.caption, "Detections: 0 | Avg Conf: 0.00");
}

#[test]
fn summary_line_reports_counts() {
    let records = vec![
        record("store_a", "a.jpg", &[]),
        record("store_a", "b.jpg", &[0.8]),
        record("store_b", "c.jpg", &[0.4, 0.6]),
    ];
    let stats = aggregate(&records);

    assert_eq!(
        summary_line(&stats, "clipstrip"),
        "2 compliant | 1 non-compliant | 3 clipstrips total"
    );
}

#[test]
fn annotated_images_are_saved_as_png() -> anyhow::Result<()> {
    let (dir, root) = create_corpus(&["shelf.jpg"]);
    let corpus = scan(&[root], &ScanOptions::default())?;
    let raw = vec![RawDetection {
        left: 5.0,
        top: 5.0,
        right: 20.0,
        bottom: 20.0,
        class_id: 0,
        label: "clipstrip".to_string(),
        confidence: 0.9,
    }];
    let rec = normalize::normalize(corpus.images[0].clone(), 0.25, raw);

    let out_dir = dir.path().join("annotated");
    let saved = save_annotated(&out_dir, &rec)?;

    assert_eq!(saved, out_dir.join("store_a_shelf.png"));
    let written = image::open(&saved)?.to_rgb8();
    assert_eq!(written.dimensions(), (64, 48));
    assert_eq!(*written.get_pixel(5, 5), BOX_COLOR);
    Ok(())
}
