use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, mpsc,
        atomic::{AtomicU64, Ordering},
    },
    thread::JoinHandle,
    time::Instant,
};

use image::RgbImage;
use tokio::sync::oneshot;

use crate::{CaptionModel, error::CaptionError, preprocess};

/// Represents the current state of the caption engine.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptionEngineState {
    /// Waiting for the next upload.
    Idle,
    /// The model is captioning an upload.
    Processing,
}

impl CaptionEngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionEngineState::Idle => "idle",
            CaptionEngineState::Processing => "processing",
        }
    }
}

type Decoder = fn(&[u8]) -> Result<RgbImage, CaptionError>;

struct CaptionEngineRequest {
    id: u64,
    image: Vec<u8>,
    reply: oneshot::Sender<Result<String, CaptionError>>,
}

/// Runs a [`CaptionModel`] on a dedicated thread.
///
/// Uploads are queued and captioned one at a time in arrival order. Each
/// caller awaits its own reply, so a slow model holds up its request without
/// blocking the async runtime.
pub struct CaptionEngine {
    state: Arc<Mutex<CaptionEngineState>>,
    req_tx: Option<mpsc::Sender<CaptionEngineRequest>>,
    inference_handle: Option<JoinHandle<()>>,
    id_counter: AtomicU64,
}

impl CaptionEngine {
    /// Creates a new engine and moves `model` to its inference thread.
    pub fn new<M>(model: M) -> Self
    where
        M: CaptionModel + Send + 'static,
    {
        Self::with_decoder(model, preprocess::decode_rgb)
    }

    pub(crate) fn with_decoder<M>(mut model: M, decode: Decoder) -> Self
    where
        M: CaptionModel + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<CaptionEngineRequest>();
        let state = Arc::new(Mutex::new(CaptionEngineState::Idle));

        let inference_handle = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(req) = req_rx.recv() {
                    log::debug!("Captioning request {}", req.id);

                    set_state(&state, CaptionEngineState::Processing);
                    let start_time = Instant::now();

                    let result = guarded(|| caption_upload(&mut model, decode, &req.image));

                    match &result {
                        Ok(caption) => log::debug!(
                            "Request {} captioned in {:?}: {caption}",
                            req.id,
                            start_time.elapsed()
                        ),
                        Err(e) => log::warn!("Request {} failed: {e}", req.id),
                    }

                    set_state(&state, CaptionEngineState::Idle);

                    // the caller may have gone away, nothing to do then
                    let _ = req.reply.send(result);
                }
                log::debug!("Caption engine stopped");
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            inference_handle: Some(inference_handle),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Returns the current state of the engine.
    pub fn state(&self) -> CaptionEngineState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Decodes, normalizes and captions an uploaded image.
    pub async fn caption(&self, image: Vec<u8>) -> Result<String, CaptionError> {
        let tx = self.req_tx.as_ref().ok_or(CaptionError::EngineUnavailable)?;
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();

        tx.send(CaptionEngineRequest { id, image, reply })
            .map_err(|_| {
                log::error!("Caption engine thread is gone");
                CaptionError::EngineUnavailable
            })?;

        response.await.map_err(|_| CaptionError::EngineUnavailable)?
    }

    /// Closes the request queue and waits for pending captions to finish.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.inference_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn set_state(state: &Mutex<CaptionEngineState>, next: CaptionEngineState) {
    *state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
}

fn caption_upload<M: CaptionModel>(
    model: &mut M,
    decode: Decoder,
    bytes: &[u8],
) -> Result<String, CaptionError> {
    let image = decode(bytes)?;
    model
        .generate_caption(&image)
        .map_err(|e| CaptionError::Caption(e.to_string()))
}

/// Runs one captioning step, turning a panic in the decoder or the model
/// into an error so the inference thread keeps serving.
fn guarded<F>(step: F) -> Result<String, CaptionError>
where
    F: FnOnce() -> Result<String, CaptionError>,
{
    panic::catch_unwind(AssertUnwindSafe(step))
        .unwrap_or_else(|payload| Err(CaptionError::Caption(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Captioning model panicked".to_string()
    }
}
