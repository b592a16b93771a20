//! PaddleOCR engine running on ONNX Runtime
//!
//! Detection finds text boxes, recognition reads each cropped line. The
//! engine reports completion through a callback; [`OcrEngine::recognize`]
//! bridges that callback to a future.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{s, Array3, Ix3, Ix4};
use ort::value::TensorRef;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::models::{ModelManager, ModelType, OnnxSession};
use super::postprocess::{ctc_greedy_decode, extract_boxes, BoxOptions, TextBox};
use super::preprocess::{
    crop_box, image_to_rgb_f32, preprocess_for_detection, preprocess_for_recognition,
    ModelInputConfig,
};
use super::{EngineError, EngineKind, OcrEngine};
use crate::config::PaddleSettings;

/// Completion callback handed to [`PaddleOcr::process`]
pub type Completion = Box<dyn FnOnce(Result<String, EngineError>) + Send>;

/// Configured models directory, or `<data_dir>/models`
pub fn models_dir(settings: &PaddleSettings, data_dir: &Path) -> PathBuf {
    settings
        .models_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("models"))
}

/// Read a PaddleOCR character dictionary, one symbol per line
pub fn load_dictionary(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dictionary {:?}", path))?;
    let dictionary: Vec<String> = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if dictionary.is_empty() {
        anyhow::bail!("Dictionary {:?} is empty", path);
    }
    Ok(dictionary)
}

/// Recognized lines as the engine's final text
pub fn join_lines(lines: Vec<String>) -> Result<String, EngineError> {
    if lines.is_empty() {
        Err(EngineError::NoText)
    } else {
        Ok(lines.join("\n"))
    }
}

/// Loaded detection and recognition models
pub struct PaddlePipeline {
    detection: OnnxSession,
    recognition: OnnxSession,
    dictionary: Vec<String>,
    input: ModelInputConfig,
    boxes: BoxOptions,
    min_score: f32,
}

impl PaddlePipeline {
    /// Load sessions from models already present in `manager`'s directory
    pub fn load(manager: &ModelManager, settings: &PaddleSettings) -> Result<Self> {
        let open = |model_type: ModelType| {
            let path = manager.model_path(model_type);
            if settings.use_gpu {
                OnnxSession::new_with_gpu(&path, settings.intra_threads)
            } else {
                OnnxSession::new(&path, settings.intra_threads)
            }
        };

        let detection = open(ModelType::Detection)?;
        let recognition = open(ModelType::Recognition)?;
        let dictionary = load_dictionary(&manager.model_path(ModelType::Dictionary))?;
        debug!("Dictionary holds {} symbols", dictionary.len());

        Ok(Self {
            detection,
            recognition,
            dictionary,
            input: ModelInputConfig::default(),
            boxes: BoxOptions {
                threshold: settings.det_threshold,
                box_threshold: settings.box_threshold,
                min_size: settings.min_box_size,
                unclip_ratio: settings.unclip_ratio,
            },
            min_score: settings.min_score,
        })
    }

    /// Text lines in reading order
    pub fn run(&mut self, image: &DynamicImage) -> Result<Vec<String>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let rgb = image_to_rgb_f32(image);
        let boxes = self.detect(&rgb)?;
        debug!("Detected {} text boxes", boxes.len());

        let mut lines = Vec::with_capacity(boxes.len());
        for text_box in &boxes {
            let crop = crop_box(&rgb, text_box);
            let (text, score) = self.recognize_line(&crop)?;
            let text = text.trim();
            if text.is_empty() || score < self.min_score {
                debug!("Dropping line {:?} (score {:.2})", text, score);
                continue;
            }
            lines.push(text.to_string());
        }
        Ok(lines)
    }

    fn detect(&mut self, rgb: &Array3<f32>) -> Result<Vec<TextBox>> {
        let (tensor, scale) = preprocess_for_detection(rgb, &self.input);

        let prob = {
            let input = TensorRef::from_array_view(tensor.view())?;
            let outputs = self.detection.session_mut().run(ort::inputs![input])?;
            let output = outputs[0]
                .try_extract_array::<f32>()?
                .into_dimensionality::<Ix4>()?;
            output.slice(s![0, 0, .., ..]).to_owned()
        };

        let (h, w, _) = rgb.dim();
        Ok(extract_boxes(prob.view(), &self.boxes)
            .into_iter()
            .map(|b| b.unscaled(scale).clamped(w as f32, h as f32))
            .filter(|b| b.width >= 1.0 && b.height >= 1.0)
            .collect())
    }

    fn recognize_line(&mut self, line: &Array3<f32>) -> Result<(String, f32)> {
        let tensor = preprocess_for_recognition(line, &self.input);
        let input = TensorRef::from_array_view(tensor.view())?;
        let outputs = self.recognition.session_mut().run(ort::inputs![input])?;
        let output = outputs[0]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix3>()?;
        Ok(ctc_greedy_decode(output.slice(s![0, .., ..]), &self.dictionary))
    }
}

/// PaddleOCR engine handle. Clones share the loaded models.
#[derive(Clone)]
pub struct PaddleOcr {
    pipeline: Arc<Mutex<PaddlePipeline>>,
}

impl PaddleOcr {
    /// Download missing models and load both sessions
    pub async fn initialize(settings: &PaddleSettings, data_dir: &Path) -> Result<Self> {
        let manager = ModelManager::with_dir(models_dir(settings, data_dir))?;
        if !manager.are_models_ready() {
            info!("Fetching PaddleOCR models");
            manager.ensure_all_models().await?;
        }

        let settings = settings.clone();
        let pipeline =
            tokio::task::spawn_blocking(move || PaddlePipeline::load(&manager, &settings))
                .await??;

        info!("PaddleOCR engine ready");
        Ok(Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
        })
    }

    /// Start recognition on the blocking pool; `on_complete` receives the result
    pub fn process<F>(&self, image: Arc<DynamicImage>, on_complete: F)
    where
        F: FnOnce(Result<String, EngineError>) + Send + 'static,
    {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || {
            let result = pipeline
                .lock()
                .run(&image)
                .map_err(|e| EngineError::Recognition(format!("PaddleOCR failed: {e:#}")))
                .and_then(join_lines);
            on_complete(result);
        });
    }
}

/// Resolve once `start` hands its callback a result. A callback that is
/// dropped without being called resolves to [`EngineError::Cancelled`].
pub async fn await_completion<S>(start: S) -> Result<String, EngineError>
where
    S: FnOnce(Completion),
{
    let (tx, rx) = oneshot::channel();
    start(Box::new(move |result| {
        let _ = tx.send(result);
    }));
    rx.await.unwrap_or(Err(EngineError::Cancelled))
}

#[async_trait]
impl OcrEngine for PaddleOcr {
    fn kind(&self) -> EngineKind {
        EngineKind::Paddle
    }

    async fn recognize(&self, image: Arc<DynamicImage>) -> Result<String, EngineError> {
        await_completion(|done| self.process(image, done)).await
    }
}
