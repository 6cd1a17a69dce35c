use anyhow::Result;
use tempfile::tempdir;

use depthcam::camera::{CameraConfig, FrameSource, SyntheticCamera};
use depthcam::capture::{CaptureConfig, CaptureController, CaptureSession};
use depthcam::StreamState;

fn stub_camera() -> CameraConfig {
    CameraConfig {
        device: "stub://capture".to_string(),
        fps: 200,
        ..CameraConfig::default()
    }
    .color_only()
}

#[test]
fn three_captures_are_numbered_from_zero() -> Result<()> {
    let dir = tempdir()?;
    let folder = dir.path().join("captured_images");
    let mut ctl = CaptureController::new(
        stub_camera(),
        CaptureConfig {
            folder: folder.clone(),
            ..CaptureConfig::default()
        },
    )?;
    assert!(folder.is_dir());

    ctl.start_camera()?;
    let mut preview = None;
    while preview.is_none() {
        preview = ctl.refresh_preview()?;
    }
    assert_eq!(preview.map(|p| p.dimensions()), Some((320, 240)));

    for expected in ["image_0000.jpg", "image_0001.jpg", "image_0002.jpg"] {
        let path = ctl.capture_image()?.expect("frame available");
        assert_eq!(path, folder.join(expected));
        assert_eq!(ctl.status(), format!("Saved: {}", expected));
    }

    for name in ["image_0000.jpg", "image_0001.jpg", "image_0002.jpg"] {
        let img = image::open(folder.join(name))?;
        assert_eq!((img.width(), img.height()), (640, 480));
    }
    assert_eq!(ctl.session().next_index(), 3);
    Ok(())
}

#[test]
fn capture_before_first_frame_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let mut ctl = CaptureController::new(
        stub_camera(),
        CaptureConfig {
            folder: dir.path().to_path_buf(),
            ..CaptureConfig::default()
        },
    )?;
    assert_eq!(ctl.capture_image()?, None);
    ctl.start_camera()?;
    assert_eq!(ctl.capture_image()?, None);
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    assert_eq!(ctl.session().next_index(), 0);
    Ok(())
}

#[test]
fn stopping_clears_preview_and_restart_keeps_counter() -> Result<()> {
    let dir = tempdir()?;
    let mut ctl = CaptureController::new(
        stub_camera(),
        CaptureConfig {
            folder: dir.path().to_path_buf(),
            ..CaptureConfig::default()
        },
    )?;
    ctl.start_camera()?;
    while ctl.refresh_preview()?.is_none() {}
    ctl.capture_image()?;

    ctl.stop_camera()?;
    assert_eq!(ctl.state(), StreamState::Idle);
    assert!(ctl.session().latest().is_none());
    assert_eq!(ctl.capture_image()?, None);
    assert_eq!(ctl.refresh_preview()?, None);

    ctl.start_camera()?;
    while ctl.refresh_preview()?.is_none() {}
    let path = ctl.capture_image()?.expect("frame available");
    assert!(path.ends_with("image_0001.jpg"));
    Ok(())
}

#[test]
fn failed_start_reports_status_and_stays_idle() -> Result<()> {
    let dir = tempdir()?;
    let camera = CameraConfig {
        width: 0,
        ..stub_camera()
    };
    let mut ctl = CaptureController::new(
        camera,
        CaptureConfig {
            folder: dir.path().to_path_buf(),
            ..CaptureConfig::default()
        },
    )?;
    assert!(ctl.start_camera().is_err());
    assert!(ctl.status().starts_with("Failed to start camera: "));
    assert_eq!(ctl.state(), StreamState::Idle);
    assert!(ctl.buttons().start);
    Ok(())
}

#[test]
fn session_counter_survives_failed_write() -> Result<()> {
    let dir = tempdir()?;
    // A file where the folder should be makes every save fail.
    let blocked = dir.path().join("not_a_dir");
    std::fs::write(&blocked, b"x")?;
    let mut session = CaptureSession::new(CaptureConfig {
        folder: blocked,
        ..CaptureConfig::default()
    });

    let mut cam = SyntheticCamera::new(stub_camera());
    cam.start()?;
    let pair = loop {
        if let Some(pair) = cam.poll()? {
            break pair;
        }
    };
    session.set_latest(pair.color.to_rgb_image());
    assert!(session.capture().is_err());
    assert_eq!(session.next_index(), 0);
    Ok(())
}
