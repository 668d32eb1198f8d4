//! Attendance controller: one actor per mounted confirmation page
//!
//! The [`AttendanceController`] handle forwards user intents to a single
//! tokio task that owns the whole session: the camera, the sampler, the
//! capture context and the cancelable timers. Timers and network calls run
//! as spawned tasks and report back into the same loop tagged with the
//! [`Generation`] they were issued under, so every state change happens on
//! one task and late results from an abandoned phase are dropped.

use crate::config::ControllerConfig;
use crate::navigation::{LoggingNavigator, Navigator};
use presenca_core::{
    CaptureContext, ControllerEvent, ErrorClassification, FailureNotice, FrameImage, Generation,
    PresencaError, QualityDetails, QualityStatus, SamplePurpose, SessionState, TaskKind,
    TaskRegistry,
};
use presenca_facial::{EnrollmentOutcome, FacialApiError, FacialService, QualityCheck, VerificationOutcome};
use presenca_media::{default_backend, CameraBackend, FrameSampler, MediaError, MediaResourceManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Read-only view of the session published after every change
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Case the session runs for
    pub case_reference: String,
    /// Current state
    pub state: SessionState,
    /// Realtime quality; always `Neutral` outside a live capture
    pub quality: QualityStatus,
    /// Guidance text for the current quality
    pub guidance: String,
    /// Measurements of the last quality check
    pub quality_details: QualityDetails,
    /// Seconds left on the countdown
    pub countdown_remaining: Option<u8>,
    /// Whether the page is visible
    pub visible: bool,
    /// Whether the camera stream is open
    pub camera_active: bool,
    /// Frame taken at the last snapshot instant
    pub last_frame: Option<FrameImage>,
    /// Confidence of the verified match
    pub confidence_score: Option<f64>,
    /// Attendance record of the verified match
    pub attendance_record_id: Option<String>,
    /// Message of the last failed enrollment
    pub enrollment_error: Option<String>,
    /// Generation the snapshot was taken under
    pub generation: u64,
    /// False once the controller has shut down
    pub mounted: bool,
}

impl SessionSnapshot {
    fn initial(case_reference: &str) -> Self {
        Self {
            case_reference: case_reference.to_string(),
            state: SessionState::Idle,
            quality: QualityStatus::Neutral,
            guidance: String::new(),
            quality_details: QualityDetails::default(),
            countdown_remaining: None,
            visible: true,
            camera_active: false,
            last_frame: None,
            confidence_score: None,
            attendance_record_id: None,
            enrollment_error: None,
            generation: Generation::initial().value(),
            mounted: true,
        }
    }

    /// Whether a capture request would currently be accepted
    pub fn can_capture(&self) -> bool {
        self.state.is_capturing()
            && self.quality == QualityStatus::Valid
            && self.countdown_remaining.is_none()
            && self.camera_active
    }
}

/// User intents sent to the session actor
#[derive(Debug)]
enum Command {
    RequestCapture,
    ConfirmEnrollment,
    DeclineEnrollment,
    SetVisibility(bool),
    Unmount(oneshot::Sender<()>),
}

/// Results of spawned work, tagged with the generation they belong to
#[derive(Debug)]
enum Internal {
    PollTick {
        generation: Generation,
    },
    QualityResult {
        generation: Generation,
        result: Result<QualityCheck, FacialApiError>,
    },
    CountdownTick {
        generation: Generation,
        remaining: u8,
    },
    VerificationResult {
        generation: Generation,
        result: Result<VerificationOutcome, FacialApiError>,
    },
    EnrollmentResult {
        generation: Generation,
        result: Result<EnrollmentOutcome, FacialApiError>,
    },
    RetryElapsed {
        generation: Generation,
    },
    ConfirmationSettled {
        generation: Generation,
        confirmed: bool,
    },
}

/// Builder for mounting an [`AttendanceController`]
pub struct ControllerBuilder {
    case_reference: Option<String>,
    camera: Option<Box<dyn CameraBackend>>,
    facial_service: Option<Arc<dyn FacialService>>,
    navigator: Option<Arc<dyn Navigator>>,
    config: ControllerConfig,
}

impl ControllerBuilder {
    fn new() -> Self {
        Self {
            case_reference: None,
            camera: None,
            facial_service: None,
            navigator: None,
            config: ControllerConfig::default(),
        }
    }

    /// Case reference taken from the page's navigation context
    pub fn case_reference(mut self, case_reference: impl Into<String>) -> Self {
        self.case_reference = Some(case_reference.into());
        self
    }

    /// Camera backend (defaults to the platform backend)
    pub fn camera(mut self, camera: impl CameraBackend + 'static) -> Self {
        self.camera = Some(Box::new(camera));
        self
    }

    /// Face-verification service
    pub fn facial_service(mut self, service: Arc<dyn FacialService>) -> Self {
        self.facial_service = Some(service);
        self
    }

    /// Router receiving the success redirect (defaults to logging only)
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Controller settings
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the session. Must be called from within a tokio runtime.
    ///
    /// Fails without starting anything when the case reference is absent or
    /// blank.
    pub fn mount(self) -> Result<AttendanceController, PresencaError> {
        let case_reference = self
            .case_reference
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(PresencaError::MissingCaseReference)?;
        let service = self
            .facial_service
            .ok_or_else(|| PresencaError::MissingConfiguration {
                field: "facial_service".to_string(),
            })?;
        self.config.validate()?;

        let camera = self.camera.unwrap_or_else(default_backend);
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(LoggingNavigator));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial(&case_reference));
        let (event_tx, _) = broadcast::channel(self.config.event_capacity);

        let session = Session {
            media: MediaResourceManager::with_request(camera, self.config.camera.clone()),
            sampler: FrameSampler::new(
                self.config.validation_quality,
                self.config.submission_quality,
            ),
            context: CaptureContext::new(case_reference.clone()),
            state: SessionState::Idle,
            generation: Generation::initial(),
            quality: QualityStatus::Neutral,
            guidance: String::new(),
            details: QualityDetails::default(),
            valid_streak: 0,
            quality_in_flight: false,
            visible: true,
            navigated: false,
            enrollment_error: None,
            tasks: TaskRegistry::new(),
            service,
            navigator,
            internal: internal_tx,
            snapshots: snapshot_tx,
            events: event_tx.clone(),
            config: self.config,
        };

        info!(case = %case_reference, "mounting attendance controller");
        let actor = tokio::spawn(session.run(command_rx, internal_rx));

        Ok(AttendanceController {
            case_reference,
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx,
            actor: Some(actor),
        })
    }
}

/// Handle to a mounted confirmation session
///
/// Dropping the handle unmounts the session.
pub struct AttendanceController {
    case_reference: String,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<ControllerEvent>,
    actor: Option<JoinHandle<()>>,
}

impl AttendanceController {
    /// Start building a controller
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    /// Case the session runs for
    pub fn case_reference(&self) -> &str {
        &self.case_reference
    }

    /// Ask for a capture. Ignored unless quality is valid and no countdown runs.
    pub fn request_capture(&self) -> Result<(), PresencaError> {
        self.send(Command::RequestCapture)
    }

    /// Accept the enrollment offer, submitting the preserved frame as reference
    pub fn confirm_enrollment(&self) -> Result<(), PresencaError> {
        self.send(Command::ConfirmEnrollment)
    }

    /// Decline the enrollment offer and go back to capturing
    pub fn decline_enrollment(&self) -> Result<(), PresencaError> {
        self.send(Command::DeclineEnrollment)
    }

    /// Report page visibility changes
    pub fn set_visibility(&self, visible: bool) -> Result<(), PresencaError> {
        self.send(Command::SetVisibility(visible))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot change
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, PresencaError> {
        let mut receiver = self.snapshots.clone();
        let snapshot = receiver
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| PresencaError::ControllerClosed)?;
        Ok(snapshot.clone())
    }

    /// Tear the session down: timers cancelled, camera released, context cleared
    pub async fn unmount(mut self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Unmount(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        if let Some(actor) = self.actor.take() {
            let _ = actor.await;
        }
    }

    fn send(&self, command: Command) -> Result<(), PresencaError> {
        self.commands
            .send(command)
            .map_err(|_| PresencaError::ControllerClosed)
    }
}

impl std::fmt::Debug for AttendanceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceController")
            .field("case_reference", &self.case_reference)
            .field("state", &self.snapshots.borrow().state.name())
            .finish()
    }
}

/// State owned by the session actor
struct Session {
    config: ControllerConfig,
    context: CaptureContext,
    state: SessionState,
    generation: Generation,
    quality: QualityStatus,
    guidance: String,
    details: QualityDetails,
    valid_streak: u32,
    quality_in_flight: bool,
    visible: bool,
    navigated: bool,
    enrollment_error: Option<String>,
    media: MediaResourceManager,
    sampler: FrameSampler,
    tasks: TaskRegistry,
    service: Arc<dyn FacialService>,
    navigator: Arc<dyn Navigator>,
    internal: mpsc::UnboundedSender<Internal>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Session {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.enter_capturing();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Unmount(ack)) => {
                        self.shutdown();
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(message) = internal.recv() => self.handle_internal(message).await,
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::RequestCapture => self.request_capture(),
            Command::ConfirmEnrollment => self.confirm_enrollment(),
            Command::DeclineEnrollment => self.decline_enrollment(),
            Command::SetVisibility(visible) => self.set_visibility(visible),
            Command::Unmount(ack) => {
                self.shutdown();
                let _ = ack.send(());
            }
        }
    }

    fn request_capture(&mut self) {
        let allowed = self.state.is_capturing()
            && self.visible
            && self.quality == QualityStatus::Valid
            && self.context.countdown_remaining.is_none()
            && self.media.is_active();
        if !allowed {
            debug!(
                state = self.state.name(),
                quality = ?self.quality,
                countdown = ?self.context.countdown_remaining,
                "capture request ignored"
            );
            return;
        }

        let seconds = self.config.countdown_seconds;
        if seconds == 0 {
            self.fire_capture();
            return;
        }

        info!(seconds, "countdown started");
        self.context.countdown_remaining = Some(seconds);
        self.emit(ControllerEvent::CountdownTick { remaining: seconds });

        let tx = self.internal.clone();
        let generation = self.generation;
        let tick = self.config.countdown_tick;
        self.tasks.spawn(TaskKind::Countdown, async move {
            for remaining in (0..seconds).rev() {
                tokio::time::sleep(tick).await;
                if tx
                    .send(Internal::CountdownTick {
                        generation,
                        remaining,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
        self.publish();
    }

    fn confirm_enrollment(&mut self) {
        if self.state != (SessionState::EnrollmentOffered { submitting: false }) {
            debug!(state = self.state.name(), "enrollment confirm ignored");
            return;
        }
        let Some(frame) = self.context.last_frame.clone() else {
            warn!("enrollment offered without a preserved frame");
            self.enter_capturing();
            return;
        };

        self.transition(SessionState::EnrollmentOffered { submitting: true });
        info!(case = %self.context.case_reference, bytes = frame.len(), "submitting reference image");

        let service = self.service.clone();
        let tx = self.internal.clone();
        let generation = self.generation;
        let case_reference = self.context.case_reference.clone();
        tokio::spawn(async move {
            let result = service.save_reference_image(&case_reference, &frame).await;
            let _ = tx.send(Internal::EnrollmentResult { generation, result });
        });
    }

    fn decline_enrollment(&mut self) {
        if self.state != (SessionState::EnrollmentOffered { submitting: false }) {
            debug!(state = self.state.name(), "enrollment decline ignored");
            return;
        }
        info!("enrollment declined");
        self.context.last_frame = None;
        self.emit(ControllerEvent::EnrollmentDeclined);
        self.enter_capturing();
    }

    fn set_visibility(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        self.emit(ControllerEvent::VisibilityChanged { visible });

        if !self.state.is_capturing() {
            debug!(visible, state = self.state.name(), "visibility changed outside capturing");
            self.publish();
            return;
        }

        self.generation = self.generation.next();
        if visible {
            info!(generation = %self.generation, "page visible, resuming capture");
            self.resume_capture();
        } else {
            info!(generation = %self.generation, "page hidden, suspending capture");
            self.stop_capture_work();
            self.media.release();
            self.publish();
        }
    }

    // ========================================================================
    // Internal messages
    // ========================================================================

    async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::PollTick { generation } => {
                if self.is_current(generation) {
                    self.poll_quality();
                }
            }
            Internal::QualityResult { generation, result } => {
                if self.is_current(generation) && self.state.is_capturing() {
                    self.apply_quality(result);
                } else {
                    debug!(%generation, current = %self.generation, "stale quality result dropped");
                }
            }
            Internal::CountdownTick {
                generation,
                remaining,
            } => {
                if self.is_current(generation)
                    && self.state.is_capturing()
                    && self.context.countdown_remaining.is_some()
                {
                    self.countdown_tick(remaining);
                }
            }
            Internal::VerificationResult { generation, result } => {
                if self.is_current(generation) && self.state == SessionState::Verifying {
                    self.apply_verification(result);
                } else {
                    debug!(%generation, current = %self.generation, "stale verification result dropped");
                }
            }
            Internal::EnrollmentResult { generation, result } => {
                if self.is_current(generation)
                    && self.state == (SessionState::EnrollmentOffered { submitting: true })
                {
                    self.apply_enrollment(result);
                } else {
                    debug!(%generation, current = %self.generation, "stale enrollment result dropped");
                }
            }
            Internal::RetryElapsed { generation } => {
                if self.is_current(generation) && matches!(self.state, SessionState::Failed(_)) {
                    info!("retry delay elapsed, returning to capture");
                    self.enter_capturing();
                }
            }
            Internal::ConfirmationSettled {
                generation,
                confirmed,
            } => {
                if self.is_current(generation) && self.state == SessionState::Succeeded {
                    self.finish(confirmed).await;
                }
            }
        }
    }

    fn poll_quality(&mut self) {
        if !self.state.is_capturing() || !self.visible || self.quality_in_flight {
            return;
        }
        let Some(handle) = self.media.handle_mut() else {
            return;
        };
        let frame = match self.sampler.sample(handle, SamplePurpose::Validation) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, category = e.category().as_str(), "failed to sample validation frame");
                return;
            }
        };

        self.quality_in_flight = true;
        let service = self.service.clone();
        let tx = self.internal.clone();
        let generation = self.generation;
        self.tasks.spawn(TaskKind::QualityCheck, async move {
            let result = service.check_frame_quality(&frame).await;
            let _ = tx.send(Internal::QualityResult { generation, result });
        });
    }

    fn apply_quality(&mut self, result: Result<QualityCheck, FacialApiError>) {
        self.quality_in_flight = false;
        let previous = (self.quality, self.guidance.clone());

        match result {
            Ok(check) if check.usable => {
                self.valid_streak = self.valid_streak.saturating_add(1);
                if self.valid_streak >= self.config.required_valid_polls {
                    self.quality = QualityStatus::Valid;
                }
                self.guidance = check.guidance;
                self.details = check.details;
            }
            Ok(check) => {
                self.valid_streak = 0;
                self.quality = QualityStatus::Invalid;
                self.guidance = check.guidance;
                self.details = check.details;
            }
            Err(e) => {
                debug!(error = %e, "quality check failed, signal neutral");
                self.valid_streak = 0;
                self.quality = QualityStatus::Neutral;
                self.guidance.clear();
                self.details = QualityDetails::default();
            }
        }

        debug!(quality = ?self.quality, guidance = %self.guidance, "quality polled");
        if previous != (self.quality, self.guidance.clone()) {
            self.emit(ControllerEvent::QualityChanged {
                status: self.quality,
                guidance: self.guidance.clone(),
            });
        }
        self.publish();

        if self.config.auto_capture && self.quality == QualityStatus::Valid {
            self.request_capture();
        }
    }

    fn countdown_tick(&mut self, remaining: u8) {
        self.context.countdown_remaining = Some(remaining);
        self.emit(ControllerEvent::CountdownTick { remaining });
        if remaining == 0 {
            self.fire_capture();
        } else {
            self.publish();
        }
    }

    fn fire_capture(&mut self) {
        self.context.countdown_remaining = None;
        self.tasks.cancel(TaskKind::Countdown);

        if self.quality != QualityStatus::Valid {
            info!(quality = ?self.quality, "capture aborted, quality no longer valid");
            self.emit(ControllerEvent::CaptureAborted);
            self.publish();
            return;
        }

        self.stop_quality_loop();
        let sampled = match self.media.handle_mut() {
            Some(handle) => self.sampler.sample(handle, SamplePurpose::Submission),
            None => Err(MediaError::CaptureNotActive),
        };
        match sampled {
            Ok(frame) => self.submit_capture(frame),
            Err(e) if e.is_device_access() => self.device_failure(e),
            Err(e) => {
                warn!(error = %e, category = e.category().as_str(), "failed to sample submission frame");
                self.fail(ErrorClassification::Unknown {
                    message: e.to_string(),
                });
            }
        }
    }

    fn submit_capture(&mut self, frame: FrameImage) {
        self.media.release();
        self.enrollment_error = None;
        self.context.last_frame = Some(frame.clone());
        self.emit(ControllerEvent::FrameSubmitted { bytes: frame.len() });
        self.transition(SessionState::Verifying);
        info!(case = %self.context.case_reference, bytes = frame.len(), "frame submitted for verification");

        let service = self.service.clone();
        let tx = self.internal.clone();
        let generation = self.generation;
        let case_reference = self.context.case_reference.clone();
        tokio::spawn(async move {
            let result = service.verify_identity(&case_reference, &frame).await;
            let _ = tx.send(Internal::VerificationResult { generation, result });
        });
    }

    fn apply_verification(&mut self, result: Result<VerificationOutcome, FacialApiError>) {
        match result {
            Ok(outcome) if outcome.verified => match outcome.attendance_record_id {
                Some(record_id) => self.succeed(outcome.confidence, record_id),
                None => {
                    warn!("verified response carried no attendance record");
                    self.fail(ErrorClassification::Unknown {
                        message: "verified without attendance record".to_string(),
                    });
                }
            },
            Ok(outcome) => {
                let message = outcome.message.unwrap_or_default();
                info!(message = %message, "verification rejected");
                self.fail(ErrorClassification::VerificationRejected { message });
            }
            Err(e) => {
                let classification = e.classify();
                if classification.triggers_enrollment() {
                    self.offer_enrollment();
                } else {
                    warn!(error = %e, code = classification.error_code(), "verification failed");
                    self.fail(classification);
                }
            }
        }
    }

    fn succeed(&mut self, confidence: Option<f64>, record_id: String) {
        if !self
            .context
            .record_success(confidence, Some(record_id.clone()))
        {
            warn!(record = %record_id, "attendance already recorded for this session");
            return;
        }
        info!(record = %record_id, ?confidence, "identity verified");
        self.emit(ControllerEvent::VerificationSucceeded {
            confidence,
            attendance_record_id: record_id.clone(),
        });
        self.transition(SessionState::Succeeded);
        self.schedule_confirmation(Some(record_id));
    }

    fn offer_enrollment(&mut self) {
        info!(case = %self.context.case_reference, "no reference image, offering enrollment");
        self.emit(ControllerEvent::VerificationFailed {
            classification: ErrorClassification::NoReferencePhoto,
        });
        self.emit(ControllerEvent::EnrollmentOffered);
        self.transition(SessionState::EnrollmentOffered { submitting: false });
    }

    fn apply_enrollment(&mut self, result: Result<EnrollmentOutcome, FacialApiError>) {
        match result {
            Ok(outcome) if outcome.success => {
                info!(path = ?outcome.reference_path, "reference image saved");
                self.emit(ControllerEvent::EnrollmentCompleted {
                    success: true,
                    message: outcome.message.clone(),
                });
                let record_id = outcome.attendance_record_id;
                self.context.record_success(None, record_id.clone());
                self.transition(SessionState::Succeeded);
                if record_id.is_none() {
                    warn!("enrollment returned no attendance record, confirmation skipped");
                }
                self.schedule_confirmation(record_id);
            }
            Ok(outcome) => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| "Erro ao salvar foto".to_string());
                self.enrollment_failed(message);
            }
            Err(e) => {
                warn!(error = %e, "reference upload failed");
                self.enrollment_failed(e.classify().user_message());
            }
        }
    }

    fn enrollment_failed(&mut self, message: String) {
        warn!(message = %message, "enrollment failed, returning to capture");
        self.emit(ControllerEvent::EnrollmentCompleted {
            success: false,
            message: Some(message.clone()),
        });
        self.enrollment_error = Some(message);
        self.context.last_frame = None;
        self.enter_capturing();
    }

    fn fail(&mut self, classification: ErrorClassification) {
        let notice = FailureNotice::classified(classification.clone(), &self.config.retry_policy());
        let retry_in = notice.retry_in;
        self.emit(ControllerEvent::VerificationFailed { classification });
        self.transition(SessionState::Failed(notice));

        if let Some(delay) = retry_in {
            let tx = self.internal.clone();
            let generation = self.generation;
            self.tasks.spawn(TaskKind::Retry, async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Internal::RetryElapsed { generation });
            });
        }
    }

    fn device_failure(&mut self, e: MediaError) {
        error!(error = %e, category = e.category().as_str(), "camera unavailable");
        self.media.release();
        self.tasks.cancel_all();
        self.emit(ControllerEvent::DeviceFailed {
            reason: e.to_string(),
        });
        self.transition(SessionState::Failed(FailureNotice::device(e.user_message())));
    }

    async fn finish(&mut self, confirmed: bool) {
        if self.navigated {
            return;
        }
        self.navigated = true;
        if !confirmed {
            warn!("leaving page before attendance confirmation succeeded");
        }
        let route = self.config.success_redirect.clone();
        let navigator = self.navigator.clone();
        info!(route = %route, "navigating away");
        navigator.navigate(&route).await;
        self.emit(ControllerEvent::Navigated { route });
    }

    // ========================================================================
    // Capture lifecycle
    // ========================================================================

    /// Enter capturing from any state, re-acquiring the camera when visible
    fn enter_capturing(&mut self) {
        self.context.countdown_remaining = None;
        self.reset_quality();

        if self.visible {
            if let Err(e) = self.media.acquire() {
                self.device_failure(e);
                return;
            }
        }
        self.transition(SessionState::Capturing);
        if self.visible {
            self.start_quality_loop();
        }
    }

    fn resume_capture(&mut self) {
        self.reset_quality();
        if let Err(e) = self.media.acquire() {
            self.device_failure(e);
            return;
        }
        self.start_quality_loop();
        self.publish();
    }

    fn start_quality_loop(&mut self) {
        let tx = self.internal.clone();
        let generation = self.generation;
        let period = self.config.quality_interval;
        self.tasks.spawn(TaskKind::QualityLoop, async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(Internal::PollTick { generation }).is_err() {
                    break;
                }
            }
        });
    }

    fn stop_quality_loop(&mut self) {
        self.tasks.cancel(TaskKind::QualityLoop);
        self.tasks.cancel(TaskKind::QualityCheck);
        self.quality_in_flight = false;
    }

    fn stop_capture_work(&mut self) {
        self.stop_quality_loop();
        self.tasks.cancel(TaskKind::Countdown);
        self.context.countdown_remaining = None;
        self.reset_quality();
    }

    fn reset_quality(&mut self) {
        self.quality = QualityStatus::Neutral;
        self.guidance.clear();
        self.details = QualityDetails::default();
        self.valid_streak = 0;
    }

    fn schedule_confirmation(&mut self, record_id: Option<String>) {
        let service = self.service.clone();
        let tx = self.internal.clone();
        let events = self.events.clone();
        let generation = self.generation;
        let delay = self.config.confirmation_delay;
        let retries = self.config.confirmation_retries;
        let backoff = self.config.confirmation_retry_backoff;

        // Not registered: the confirmation must outlive an unmount.
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(record_id) = record_id else {
                let _ = tx.send(Internal::ConfirmationSettled {
                    generation,
                    confirmed: false,
                });
                return;
            };
            confirm_with_retries(service, events, tx, generation, record_id, retries, backoff)
                .await;
        });
    }

    // ========================================================================
    // Transitions and publishing
    // ========================================================================

    fn transition(&mut self, next: SessionState) {
        if !next.is_capturing() {
            self.stop_capture_work();
            self.media.release();
        }
        if !matches!(next, SessionState::Failed(_)) {
            self.tasks.cancel(TaskKind::Retry);
        }

        let from = std::mem::replace(&mut self.state, next.clone());
        self.generation = self.generation.next();
        info!(
            from = from.name(),
            to = next.name(),
            generation = %self.generation,
            "session state changed"
        );
        self.emit(ControllerEvent::StateChanged { from, to: next });
        self.publish();
    }

    fn shutdown(&mut self) {
        info!(case = %self.context.case_reference, state = self.state.name(), "unmounting attendance controller");
        self.tasks.cancel_all();
        self.media.release();
        self.quality_in_flight = false;
        self.context.clear();
        self.generation = self.generation.next();
        self.reset_quality();
        self.snapshots.send_modify(|snapshot| {
            snapshot.mounted = false;
            snapshot.camera_active = false;
            snapshot.quality = QualityStatus::Neutral;
            snapshot.countdown_remaining = None;
            snapshot.last_frame = None;
        });
    }

    fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        let live = self.state.is_capturing() && self.visible;
        let snapshot = SessionSnapshot {
            case_reference: self.context.case_reference.clone(),
            state: self.state.clone(),
            quality: if live { self.quality } else { QualityStatus::Neutral },
            guidance: if live { self.guidance.clone() } else { String::new() },
            quality_details: if live {
                self.details.clone()
            } else {
                QualityDetails::default()
            },
            countdown_remaining: self.context.countdown_remaining,
            visible: self.visible,
            camera_active: self.media.is_active(),
            last_frame: self.context.last_frame.clone(),
            confidence_score: self.context.confidence_score,
            attendance_record_id: self.context.attendance_record_id.clone(),
            enrollment_error: self.enrollment_error.clone(),
            generation: self.generation.value(),
            mounted: true,
        };
        self.snapshots.send_replace(snapshot);
    }
}

/// Confirm `record_id`, retrying with linear back-off after failures.
///
/// The actor hears about the first attempt only; later attempts are reported
/// as events.
async fn confirm_with_retries(
    service: Arc<dyn FacialService>,
    events: broadcast::Sender<ControllerEvent>,
    tx: mpsc::UnboundedSender<Internal>,
    generation: Generation,
    record_id: String,
    retries: u32,
    backoff: Duration,
) {
    let attempts = retries.saturating_add(1);
    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(backoff * (attempt - 1)).await;
        }
        match service.confirm_attendance(&record_id).await {
            Ok(()) => {
                info!(record = %record_id, attempt, "attendance confirmed");
                let _ = events.send(ControllerEvent::AttendanceConfirmed {
                    attendance_record_id: record_id.clone(),
                    attempts: attempt,
                });
                if attempt == 1 {
                    let _ = tx.send(Internal::ConfirmationSettled {
                        generation,
                        confirmed: true,
                    });
                }
                return;
            }
            Err(e) => {
                let will_retry = attempt < attempts;
                error!(record = %record_id, attempt, will_retry, error = %e, "attendance confirmation failed");
                let _ = events.send(ControllerEvent::ConfirmationFailed {
                    attendance_record_id: record_id.clone(),
                    attempt,
                    will_retry,
                    reason: e.to_string(),
                });
                if attempt == 1 {
                    let _ = tx.send(Internal::ConfirmationSettled {
                        generation,
                        confirmed: false,
                    });
                }
            }
        }
    }
}
