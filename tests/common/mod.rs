//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use image::DynamicImage;
use imgclas::config::{FlatConfig, Settings};
use imgclas::models::{ModelHandle, ModelLoader, ModelStore};
use imgclas::service::ImageClassifier;
use imgclas::storage::NoSync;
use imgclas::training::Trainer;
use imgclas::{Error, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Handle returning the same probability vector for every image.
pub struct FixedHandle(pub Vec<f32>);

impl ModelHandle for FixedHandle {
    fn predict(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![self.0.clone(); images.len()])
    }
}

/// Handle that scores images by their red channel so different inputs
/// get different predictions.
pub struct RedHandle;

impl ModelHandle for RedHandle {
    fn predict(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
        Ok(images
            .iter()
            .map(|img| {
                let red = f32::from(img.to_rgb8().get_pixel(0, 0)[0]) / 255.0;
                vec![red, 1.0 - red, 0.0]
            })
            .collect())
    }
}

/// Handle that always fails.
pub struct FailingHandle;

impl ModelHandle for FailingHandle {
    fn predict(&self, _: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Inference {
            reason: "device lost".to_string(),
        })
    }
}

/// Loader counting how many models it built.
#[derive(Clone)]
pub struct CountingLoader {
    pub loads: Arc<AtomicUsize>,
    make: fn() -> Box<dyn ModelHandle>,
}

impl CountingLoader {
    pub fn new(make: fn() -> Box<dyn ModelHandle>) -> Self {
        Self {
            loads: Arc::default(),
            make,
        }
    }

    pub fn count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, _: &Path, _: &FlatConfig) -> Result<Box<dyn ModelHandle>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok((self.make)())
    }
}

/// Trainer that must never run.
pub struct NoTrainer;

impl Trainer for NoTrainer {
    fn train(&self, timestamp: &str, _: &Path, _: &Path) -> Result<()> {
        Err(Error::Training {
            timestamp: timestamp.to_string(),
            reason: "not available in tests".to_string(),
        })
    }
}

/// Trainer writing a loadable run with three classes.
pub struct RunTrainer;

impl Trainer for RunTrainer {
    fn train(&self, _: &str, run_dir: &Path, _: &Path) -> Result<()> {
        std::fs::write(run_dir.join("ckpts").join("final_model.onnx"), b"onnx")?;
        std::fs::write(
            run_dir.join("dataset_files").join("classes.txt"),
            "rose\noak\nfern\n",
        )?;
        Ok(())
    }
}

/// Write a training run with `classes` and one checkpoint.
pub fn write_run(models: &Path, timestamp: &str, classes: &[&str], info: Option<&[&str]>) {
    let store = ModelStore::new(models);
    let splits = store.splits_dir(timestamp);
    std::fs::create_dir_all(&splits).unwrap();
    std::fs::write(splits.join("classes.txt"), classes.join("\n")).unwrap();
    if let Some(info) = info {
        std::fs::write(splits.join("info.txt"), info.join("\n")).unwrap();
    }
    std::fs::create_dir_all(store.checkpoints_dir(timestamp)).unwrap();
    std::fs::write(
        store.checkpoint_path(timestamp, "final_model.onnx"),
        b"onnx",
    )
    .unwrap();
    let conf = store.conf_path(timestamp);
    std::fs::create_dir_all(conf.parent().unwrap()).unwrap();
    std::fs::write(conf, "{}").unwrap();
}

/// Settings rooted in `dir`.
pub fn settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.models_dir = dir.join("models");
    settings.paths.splits_dir = dir.join("splits");
    settings.paths.images_dir = dir.join("images");
    settings.http.probe_timeout_secs = 2;
    settings.http.fetch_timeout_secs = 2;
    settings
}

/// Service over `dir` with `loader`.
pub fn service(dir: &Path, loader: CountingLoader) -> ImageClassifier {
    service_with_trainer(dir, loader, Box::new(NoTrainer))
}

/// Service over `dir` with `loader` and `trainer`.
pub fn service_with_trainer(
    dir: &Path,
    loader: CountingLoader,
    trainer: Box<dyn Trainer>,
) -> ImageClassifier {
    ImageClassifier::new(settings(dir), Box::new(loader), trainer, Box::new(NoSync)).unwrap()
}

/// PNG bytes of a solid `width` x `height` image.
pub fn png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Inline data URL of a solid PNG.
pub fn inline_png(rgb: [u8; 3]) -> String {
    use base64::Engine as _;
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png(4, 4, rgb))
    )
}

/// Serve every request with `content_type` and `body` on a local port.
///
/// Returns the base URL. The server thread lives until the process exits.
pub fn serve(content_type: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if header == "\r\n" => break,
                    Ok(_) => {}
                }
            }

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            if !request_line.starts_with("HEAD") {
                let _ = stream.write_all(&body);
            }
            let _ = stream.flush();
        }
    });

    format!("http://{addr}")
}
