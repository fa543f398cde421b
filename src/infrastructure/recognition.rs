use crate::domain::ports::{PlateReading, PlateRecognizer, PlateRecognizerBox};
use crate::domain::vehicle::PlateNumber;
use crate::error::{ParkingError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default bound on an inference call; generous because the model may
/// be loading on the first request.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(180);

/// The canned plate returned when inference is disabled in dev/CI.
pub const DEMO_PLATE: &str = "49G1-11111";

/// Which recognizer the gate is built with.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerConfig {
    /// Fixed-response stub; no external dependency.
    Stub,
    /// Spawn an external inference process per frame.
    Command { program: String, args: Vec<String> },
}

impl RecognizerConfig {
    pub fn into_recognizer(self) -> PlateRecognizerBox {
        match self {
            Self::Stub => Box::new(FixedPlateRecognizer::demo()),
            Self::Command { program, args } => Box::new(CommandRecognizer::new(program, args)),
        }
    }
}

/// Stub recognizer returning a fixed reading regardless of the frame.
pub struct FixedPlateRecognizer {
    reading: PlateReading,
}

impl FixedPlateRecognizer {
    pub fn new(plate: PlateNumber, confidence: f64) -> Self {
        Self {
            reading: PlateReading { plate, confidence },
        }
    }

    /// The demo reading used when ML is disabled.
    pub fn demo() -> Self {
        // DEMO_PLATE is non-empty, so this cannot fail.
        match PlateNumber::new(DEMO_PLATE) {
            Ok(plate) => Self::new(plate, 0.99),
            Err(_) => unreachable!("demo plate is a valid plate"),
        }
    }
}

#[async_trait]
impl PlateRecognizer for FixedPlateRecognizer {
    async fn recognize(&self, _image: &[u8]) -> Result<PlateReading> {
        Ok(self.reading.clone())
    }
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    success: bool,
    #[serde(default)]
    plate_number: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    message: Option<String>,
}

/// Runs an external inference command per frame.
///
/// The frame is fed base64-encoded over stdin (frames exceed argv
/// limits) and the child must print one JSON object to stdout:
/// `{"success": true, "plate_number": "...", "confidence": 0.97}`.
/// The whole call is bounded by a timeout, after which the child is
/// killed and the call reported as failed.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_INFERENCE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, image: &[u8]) -> Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(BASE64.encode(image).as_bytes()).await?;
            stdin.shutdown().await?;
        }

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            // kill_on_drop reaps the child.
            Err(_) => Err(ParkingError::RecognitionTimeout(self.timeout)),
        }
    }
}

#[async_trait]
impl PlateRecognizer for CommandRecognizer {
    async fn recognize(&self, image: &[u8]) -> Result<PlateReading> {
        let output = self.run(image).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ParkingError::RecognitionFailed(format!(
                "inference exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let response: InferenceResponse =
            serde_json::from_slice(&output.stdout).map_err(|e| {
                ParkingError::RecognitionFailed(format!("unparseable inference output: {e}"))
            })?;

        if !response.success {
            return Err(ParkingError::RecognitionFailed(
                response
                    .message
                    .unwrap_or_else(|| "no plate detected".to_string()),
            ));
        }

        let plate = PlateNumber::new(response.plate_number)
            .map_err(|_| ParkingError::RecognitionFailed("empty plate in result".to_string()))?;
        Ok(PlateReading {
            plate,
            confidence: response.confidence,
        })
    }
}
