mod common;

use std::sync::Arc;

use common::{ScriptedDetector, create_corpus, create_test_image};
use shelfcheck::{
    ConfigError, DetectionStatus, ReviewConfig, ReviewError, ReviewMode, Session,
};

fn open(root: &std::path::Path, detector: &Arc<ScriptedDetector>) -> anyhow::Result<Session> {
    let config = ReviewConfig::with_roots([root]);
    Ok(Session::open(config, detector.clone())?)
}

fn scripted() -> ScriptedDetector {
    ScriptedDetector::new()
        .with("a.jpg", &[0.8])
        .with("b.jpg", &[0.3, 0.5])
        .with("c.jpg", &[])
}

#[test]
fn opening_runs_no_detection() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());

    let session = open(&root, &detector)?;

    assert_eq!(session.images().len(), 3);
    assert_eq!(detector.calls(), 0);
    Ok(())
}

#[test]
fn statistics_match_scripted_detections() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;

    let stats = session.statistics();

    assert_eq!(stats.total_images, 3);
    assert_eq!(stats.total_detections, 3);
    assert_eq!(stats.compliant_images, 2);
    assert_eq!(format!("{:.1}", stats.compliance_rate), "66.7");
    assert!((stats.average_confidence - 1.6 / 3.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn repeated_reads_hit_the_cache() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;

    let first = session.statistics();
    assert_eq!(detector.calls(), 3);

    let second = session.statistics();
    session.advance();
    session.current();
    assert_eq!(detector.calls(), 3);
    assert_eq!(first, second);
    assert!(session.cache().hits() >= 4);
    assert_eq!(session.cache().misses(), 3);
    Ok(())
}

#[test]
fn navigation_only_detects_visible_images() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;

    let record = session.current_record().expect("first image");
    assert_eq!(record.image().file_name(), "a.jpg");
    assert_eq!(detector.calls(), 1);

    session.advance();
    let record = session.current_record().expect("second image");
    assert_eq!(record.image().file_name(), "b.jpg");
    assert_eq!(record.detection_count(), 2);
    assert_eq!(detector.calls(), 2);
    Ok(())
}

#[test]
fn threshold_change_invalidates_and_reclassifies() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;

    let low = session.statistics();
    assert_eq!(low.compliant_images, 2);

    session.set_threshold(0.6)?;
    assert!(session.cache().is_empty());

    let high = session.statistics();
    assert_eq!(detector.calls(), 6);
    assert_eq!(high.compliant_images, 1);
    assert_eq!(high.total_detections, 1);
    assert!(high.total_detections <= low.total_detections);

    session.set_threshold(0.9)?;
    let strict = session.statistics();
    assert_eq!(strict.compliant_images, 0);
    assert_eq!(strict.compliance_rate, 0.0);
    assert_eq!(strict.average_confidence, 0.0);
    Ok(())
}

#[test]
fn same_threshold_keeps_the_cache() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;

    session.statistics();
    session.set_threshold(0.25)?;
    session.statistics();

    assert_eq!(detector.calls(), 1);
    Ok(())
}

#[test]
fn invalid_threshold_is_rejected() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;

    assert!(matches!(
        session.set_threshold(1.5),
        Err(ConfigError::InvalidThreshold(_))
    ));
    assert!(session.set_threshold(f32::NAN).is_err());
    assert_eq!(session.threshold(), 0.25);
    Ok(())
}

#[test]
fn failed_detection_is_distinct_from_zero_detections() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "broken.jpg", "c.jpg"]);
    let detector = Arc::new(scripted().failing("broken.jpg"));
    let mut session = open(&root, &detector)?;

    let records = session.records();
    let broken = records[1];
    let empty = records[2];

    assert!(broken.is_failed());
    assert!(broken.needs_review());
    assert!(matches!(broken.status(), DetectionStatus::Failed { reason } if reason.contains("corrupt image data")));
    assert!(!empty.is_failed());
    assert!(!empty.needs_review());
    assert_eq!(broken.detection_count(), empty.detection_count());

    let stats = session.statistics();
    assert_eq!(stats.failed_images, 1);
    assert_eq!(stats.total_images, 3);
    assert_eq!(stats.non_compliant_images, 2);
    Ok(())
}

#[test]
fn refresh_picks_up_new_files_and_keeps_cursor() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;
    session.statistics();
    session.jump(1);

    create_test_image(&root, "d.jpg");
    let cursor = session.refresh()?;

    assert_eq!(cursor, 1);
    assert_eq!(session.images().len(), 4);
    assert!(session.cache().is_empty());
    assert_eq!(session.statistics().total_images, 4);
    assert_eq!(detector.calls(), 7);
    Ok(())
}

#[test]
fn refresh_clamps_cursor_after_removal() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;
    session.jump(2);

    std::fs::remove_file(root.join("c.jpg"))?;
    assert_eq!(session.refresh()?, 1);
    Ok(())
}

#[test]
fn failed_refresh_keeps_the_session_intact() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;
    session.statistics();
    session.advance();

    std::fs::remove_dir_all(&root)?;
    assert!(matches!(session.refresh(), Err(ReviewError::Scan(_))));

    assert_eq!(session.images().len(), 2);
    assert_eq!(session.cursor(), 1);
    assert_eq!(session.cache().len(), 2);
    assert_eq!(session.statistics().total_images, 2);
    assert_eq!(detector.calls(), 2);
    Ok(())
}

#[test]
fn rescan_resets_cursor_when_corpus_changes() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&["a.jpg", "b.jpg", "c.jpg"]);
    let detector = Arc::new(scripted());
    let mut session = open(&root, &detector)?;

    session.jump(2);
    assert_eq!(session.rescan()?, 2);

    create_test_image(&root, "d.jpg");
    assert_eq!(session.rescan()?, 0);
    Ok(())
}

#[test]
fn parallel_detection_keeps_canonical_order() -> anyhow::Result<()> {
    let files: Vec<String> = (0..12).map(|i| format!("img_{i:02}.jpg")).collect();
    let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
    let (_dir, root) = create_corpus(&file_refs);

    let detector = Arc::new(ScriptedDetector::new().with("img_05.jpg", &[0.9]));
    let config = ReviewConfig {
        parallel: true,
        ..ReviewConfig::with_roots([&root])
    };
    let mut session = Session::open(config, detector.clone())?;

    let names: Vec<String> = session
        .records()
        .iter()
        .map(|r| r.image().file_name())
        .collect();
    assert_eq!(names, files);
    assert_eq!(detector.calls(), 12);
    assert_eq!(session.statistics().compliant_images, 1);
    Ok(())
}

#[test]
fn paged_snapshot_shows_one_page() -> anyhow::Result<()> {
    let files: Vec<String> = (0..10).map(|i| format!("img_{i:02}.jpg")).collect();
    let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
    let (_dir, root) = create_corpus(&file_refs);

    let detector = Arc::new(ScriptedDetector::new());
    let config = ReviewConfig {
        mode: ReviewMode::Paged,
        page_size: 4,
        ..ReviewConfig::with_roots([&root])
    };
    let mut session = Session::open(config, detector)?;

    session.jump(5);
    let snapshot = session.snapshot();

    assert_eq!(snapshot.session_id, session.id());
    assert_eq!(snapshot.position.cursor, 2);
    assert_eq!(snapshot.position.first, 9);
    assert_eq!(snapshot.position.last, 10);
    assert_eq!(snapshot.records.len(), 2);
    assert_eq!(snapshot.statistics.total_images, 10);

    let json = serde_json::to_value(&snapshot)?;
    assert_eq!(json["mode"], "paged");
    assert_eq!(json["records"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn empty_corpus_opens_with_zero_statistics() -> anyhow::Result<()> {
    let (_dir, root) = create_corpus(&[]);
    let detector = Arc::new(ScriptedDetector::new());
    let mut session = open(&root, &detector)?;

    assert!(session.corpus().is_empty());
    assert!(session.current().is_empty());
    let stats = session.statistics();
    assert_eq!(stats.compliance_rate, 0.0);
    assert_eq!(session.advance(), 0);
    Ok(())
}

#[test]
fn open_fails_on_bad_config_or_missing_roots() {
    let detector = Arc::new(ScriptedDetector::new());

    let config = ReviewConfig {
        confidence_threshold: -0.1,
        ..ReviewConfig::with_roots(["/tmp"])
    };
    assert!(matches!(
        Session::open(config, detector.clone()),
        Err(ReviewError::Config(ConfigError::InvalidThreshold(_)))
    ));

    let config = ReviewConfig::with_roots(["/definitely/not/a/real/root"]);
    assert!(matches!(
        Session::open(config, detector),
        Err(ReviewError::Scan(_))
    ));
}
