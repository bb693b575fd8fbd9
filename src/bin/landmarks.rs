//! Landmark preview: Haar face boxes with approximate five-point keypoints.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8};
use opencv::prelude::*;
use vision_node::{
    camera::{CameraSource, FrameSource},
    config::{CameraConfig, RecognitionConfig},
    display::PreviewWindow,
    face_detection::{approximate_keypoints, order_keypoints, FaceDetector},
    utils::safe_cast::f32_to_i32_clamp,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Preview face boxes and five-point keypoints", long_about = None)]
struct Args {
    /// Camera index to try (repeat to try several, in order)
    #[arg(long, default_values_t = [1, 0, 2])]
    cam: Vec<i32>,

    /// Haar cascade XML
    #[arg(long)]
    cascade: Option<String>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn draw(frame: &mut Mat, detector: &mut FaceDetector) -> Result<()> {
    let (width, height) = (frame.cols(), frame.rows());
    for face in detector.detect(frame)? {
        imgproc::rectangle(frame, face.bbox, Scalar::new(0.0, 255.0, 0.0, 0.0), 2, LINE_8, 0)?;

        let mut points = approximate_keypoints(face.bbox);
        order_keypoints(&mut points);
        for p in &points {
            let center = Point::new(f32_to_i32_clamp(p.x, 0, width), f32_to_i32_clamp(p.y, 0, height));
            imgproc::circle(frame, center, 3, Scalar::new(0.0, 255.0, 255.0, 0.0), -1, LINE_8, 0)?;
        }

        imgproc::put_text(
            frame,
            "5pt",
            Point::new(face.bbox.x, (face.bbox.y - 8).max(12)),
            FONT_HERSHEY_SIMPLEX,
            0.6,
            Scalar::new(0.0, 255.0, 0.0, 0.0),
            2,
            LINE_8,
            false,
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(if args.debug { "debug" } else { "info" }));

    let recognition = RecognitionConfig::default();
    let cascade = args
        .cascade
        .map_or(recognition.cascade_path, Into::into);
    let mut detector = FaceDetector::new(&cascade, recognition.min_face_size).context("Failed to load face cascade")?;

    let mut camera = CameraSource::open(&CameraConfig {
        indices: args.cam,
        ..CameraConfig::default()
    })?;
    let window = PreviewWindow::open("Landmarks (q to quit)")?;

    while let Some(mut frame) = camera.read_frame()? {
        draw(&mut frame, &mut detector)?;
        if window.show(&frame)? {
            break;
        }
    }

    camera.release()?;
    window.close()?;
    info!("Landmark preview closed");
    Ok(())
}
