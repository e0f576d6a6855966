use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

use super::classifier::ContentType;
use super::color::HexColor;
use super::debounce::Debouncer;
use super::options::{DownloadFormat, Ecc, GeneratorOptions, Logo};
use super::render::{Artifact, RenderError, render};
use super::tracking::{TrackingAugmenter, TrackingError};
use crate::models::qr_record::{QrRecord, StyleSnapshot};
use crate::repository::{QrRepository, RepositoryError};

/// The signed-in user driving a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Generating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorField {
    Foreground,
    Background,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
}

/// The file handed to the user after a successful generate.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub record_id: String,
    pub tracking_url: Option<String>,
}

impl Download {
    fn new(artifact: Artifact, record_id: String, tracking_url: Option<String>) -> Self {
        Self {
            file_name: format!(
                "qrcode-{}.{}",
                chrono::Utc::now().timestamp_millis(),
                artifact.format.extension()
            ),
            content_type: artifact.format.mime_type(),
            bytes: artifact.bytes,
            record_id,
            tracking_url,
        }
    }
}

#[derive(Debug)]
pub enum GenerateOutcome {
    /// Content was empty; nothing happened.
    Nothing,
    /// Another generate is already in flight.
    Suppressed,
    /// Content changed while tracking was pending; the result was dropped.
    Discarded,
    Ready(Download),
}

struct SessionInner {
    options: GeneratorOptions,
    identity: Option<Identity>,
    // Bumped on every content change so in-flight results can tell they are stale
    epoch: u64,
}

/// One user's editing session.
///
/// All setters are cheap and synchronous. `generate` is the only async
/// operation and at most one runs at a time.
pub struct GeneratorSession {
    inner: Mutex<SessionInner>,
    generating: AtomicBool,
    augmenter: Arc<TrackingAugmenter>,
    repository: Arc<dyn QrRepository>,
}

impl GeneratorSession {
    pub fn new(
        augmenter: Arc<TrackingAugmenter>,
        repository: Arc<dyn QrRepository>,
        identity: Option<Identity>,
    ) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                options: GeneratorOptions::default(),
                identity,
                epoch: 0,
            }),
            generating: AtomicBool::new(false),
            augmenter,
            repository,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.generating.load(Ordering::Acquire) {
            SessionState::Generating
        } else {
            SessionState::Idle
        }
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> GeneratorOptions {
        self.inner.lock().options.clone()
    }

    pub fn content_type(&self) -> ContentType {
        self.inner.lock().options.content_type()
    }

    pub fn set_content(&self, content: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.options.set_content(content);
        inner.epoch += 1;
        if !Self::can_track(&inner) {
            inner.options.tracking_enabled = false;
        }
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        let mut inner = self.inner.lock();
        inner.identity = identity;
        if !Self::can_track(&inner) {
            inner.options.tracking_enabled = false;
        }
    }

    /// Whether the tracking toggle may currently be switched on.
    pub fn tracking_available(&self) -> bool {
        Self::can_track(&self.inner.lock())
    }

    /// Returns the effective value; requests to enable are ignored unless
    /// the content is a URL and someone is signed in.
    pub fn set_tracking(&self, enabled: bool) -> bool {
        let mut inner = self.inner.lock();
        inner.options.tracking_enabled = enabled && Self::can_track(&inner);
        inner.options.tracking_enabled
    }

    pub fn set_color(&self, field: ColorField, color: HexColor) {
        let mut inner = self.inner.lock();
        match field {
            ColorField::Foreground => inner.options.style.foreground_color = color,
            ColorField::Background => inner.options.style.background_color = color,
        }
    }

    pub fn set_logo(&self, logo: Option<Logo>) {
        self.inner.lock().options.logo = logo;
    }

    pub fn set_format(&self, format: DownloadFormat) {
        self.inner.lock().options.download_format = format;
    }

    pub fn set_size(&self, size: u32) {
        let mut inner = self.inner.lock();
        inner.options.style = inner.options.style.with_size(size);
    }

    pub fn set_error_correction(&self, ecc: Ecc) {
        self.inner.lock().options.style.error_correction = ecc;
    }

    pub fn set_access_key(&self, access_key: Option<String>) {
        self.inner.lock().options.access_key = access_key.filter(|key| !key.trim().is_empty());
    }

    /// Debounced text input for one of the colors. Values that are not
    /// valid hex colors are never committed.
    pub fn color_input(self: &Arc<Self>, field: ColorField, delay: Duration) -> Debouncer<String> {
        let session: Weak<Self> = Arc::downgrade(self);
        Debouncer::new(delay, move |raw: String| {
            let Some(session) = session.upgrade() else {
                return;
            };
            match raw.parse::<HexColor>() {
                Ok(color) => session.set_color(field, color),
                Err(e) => debug!("Ignoring color input: {}", e),
            }
        })
    }

    /// Live preview of the current options. Never contacts the tracking
    /// service and never records anything.
    pub fn preview(&self) -> Result<Option<Artifact>, RenderError> {
        let options = self.options();
        if options.content().is_empty() {
            return Ok(None);
        }
        render(
            options.content(),
            &options.style,
            options.logo.as_ref(),
            options.download_format,
        )
        .map(Some)
    }

    /// Augment, render and record the current options.
    pub async fn generate(&self) -> Result<GenerateOutcome, GenerateError> {
        let (options, identity, epoch) = {
            let inner = self.inner.lock();
            if inner.options.content().is_empty() {
                return Ok(GenerateOutcome::Nothing);
            }
            (inner.options.clone(), inner.identity.clone(), inner.epoch)
        };

        let Some(_in_flight) = InFlight::acquire(&self.generating) else {
            debug!("Generate already in progress, ignoring duplicate submission");
            return Ok(GenerateOutcome::Suppressed);
        };

        let tracking = options.tracking_enabled
            && options.content_type().is_trackable()
            && identity.is_some();
        let augmented = self
            .augmenter
            .augment(options.content(), tracking)
            .await
            .inspect_err(|e| warn!("Tracking failed for {}: {}", options.content(), e))?;

        if self.inner.lock().epoch != epoch {
            info!("Content changed while generating, discarding result");
            return Ok(GenerateOutcome::Discarded);
        }

        let artifact = render(
            &augmented.content,
            &options.style,
            options.logo.as_ref(),
            options.download_format,
        )?;

        let tracking_code = augmented
            .tracking
            .as_ref()
            .and_then(|meta| meta.tracking_code.clone());
        let tracking_url = augmented.tracking.map(|meta| meta.tracking_url);
        let record = QrRecord::new(
            augmented.content,
            options.content().to_string(),
            options.content_type(),
            tracking_code,
            StyleSnapshot {
                foreground_color: options.style.foreground_color,
                background_color: options.style.background_color,
                has_logo: options.logo.is_some(),
                format: options.download_format,
                size: options.style.size,
            },
        )
        .owned_by(identity.map(|identity| identity.user_id))
        .with_access_key(options.access_key.clone());

        let record_id = record.id.clone();
        self.repository.append(record).await?;
        info!("Generated QR code {}", record_id);

        Ok(GenerateOutcome::Ready(Download::new(
            artifact,
            record_id,
            tracking_url,
        )))
    }

    fn can_track(inner: &SessionInner) -> bool {
        inner.identity.is_some() && inner.options.content_type().is_trackable()
    }
}

/// Holds the generating flag; releases it on drop so every exit path,
/// including errors, returns the session to idle.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
