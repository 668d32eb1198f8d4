//! Session behavior of the attendance controller against a scripted face service

use async_trait::async_trait;
use parking_lot::Mutex;
use presenca::{
    AttendanceController, ControllerConfig, ControllerEvent, EnrollmentOutcome,
    ErrorClassification, FacialApiError, FacialService, FailureCause, FrameImage, PresencaError,
    QualityCheck, QualityDetails, QualityStatus, RecordingNavigator, SessionSnapshot,
    SessionState, SyntheticCamera, VerificationOutcome,
};
use presenca_media::SyntheticCameraState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Scripted face service
// ============================================================================

type Scripted<T> = Mutex<VecDeque<Result<T, FacialApiError>>>;

#[derive(Default)]
struct MockFacialService {
    unusable: AtomicBool,
    quality_down: AtomicBool,
    quality_calls: AtomicUsize,
    verify_script: Scripted<VerificationOutcome>,
    verify_delay: Mutex<Option<Duration>>,
    verify_calls: AtomicUsize,
    confirm_script: Scripted<()>,
    confirmations: Mutex<Vec<String>>,
    save_script: Scripted<EnrollmentOutcome>,
    save_delay: Mutex<Option<Duration>>,
    save_calls: AtomicUsize,
}

impl MockFacialService {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_usable(&self, usable: bool) {
        self.unusable.store(!usable, Ordering::SeqCst);
    }

    fn set_quality_down(&self, down: bool) {
        self.quality_down.store(down, Ordering::SeqCst);
    }

    fn push_verify(&self, result: Result<VerificationOutcome, FacialApiError>) {
        self.verify_script.lock().push_back(result);
    }

    fn push_confirm(&self, result: Result<(), FacialApiError>) {
        self.confirm_script.lock().push_back(result);
    }

    fn push_save(&self, result: Result<EnrollmentOutcome, FacialApiError>) {
        self.save_script.lock().push_back(result);
    }

    fn quality_calls(&self) -> usize {
        self.quality_calls.load(Ordering::SeqCst)
    }

    fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn confirmations(&self) -> Vec<String> {
        self.confirmations.lock().clone()
    }
}

#[async_trait]
impl FacialService for MockFacialService {
    async fn check_frame_quality(&self, frame: &FrameImage) -> Result<QualityCheck, FacialApiError> {
        assert!(!frame.is_empty());
        self.quality_calls.fetch_add(1, Ordering::SeqCst);
        if self.quality_down.load(Ordering::SeqCst) {
            return Err(FacialApiError::Transport {
                reason: "validator offline".to_string(),
            });
        }
        let usable = !self.unusable.load(Ordering::SeqCst);
        Ok(QualityCheck {
            usable,
            guidance: if usable {
                "Rosto detectado".to_string()
            } else {
                "Aproxime-se da câmera".to_string()
            },
            details: QualityDetails {
                face_count: Some(1),
                ..QualityDetails::default()
            },
        })
    }

    async fn verify_identity(
        &self,
        case_reference: &str,
        frame: &FrameImage,
    ) -> Result<VerificationOutcome, FacialApiError> {
        assert_eq!(case_reference, CASE);
        assert!(!frame.is_empty());
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.verify_delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let scripted = self.verify_script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(verified("rec-1")))
    }

    async fn confirm_attendance(&self, attendance_record_id: &str) -> Result<(), FacialApiError> {
        self.confirmations
            .lock()
            .push(attendance_record_id.to_string());
        let scripted = self.confirm_script.lock().pop_front();
        scripted.unwrap_or(Ok(()))
    }

    async fn save_reference_image(
        &self,
        case_reference: &str,
        frame: &FrameImage,
    ) -> Result<EnrollmentOutcome, FacialApiError> {
        assert_eq!(case_reference, CASE);
        assert!(!frame.is_empty());
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.save_delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let scripted = self.save_script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(enrolled(Some("rec-9"))))
    }
}

const CASE: &str = "0001234-56.2024.8.05.0001";

fn verified(record: &str) -> VerificationOutcome {
    VerificationOutcome {
        verified: true,
        confidence: Some(93.5),
        attendance_record_id: Some(record.to_string()),
        message: Some("Rosto verificado".to_string()),
    }
}

fn rejected(message: &str) -> VerificationOutcome {
    VerificationOutcome {
        verified: false,
        confidence: Some(41.0),
        attendance_record_id: None,
        message: Some(message.to_string()),
    }
}

fn enrolled(record: Option<&str>) -> EnrollmentOutcome {
    EnrollmentOutcome {
        success: true,
        message: Some("Rosto cadastrado com sucesso".to_string()),
        attendance_record_id: record.map(str::to_string),
        reference_path: Some("fotos/0001234.jpg".to_string()),
    }
}

fn no_reference() -> FacialApiError {
    FacialApiError::NoReferencePhoto {
        message: "Não há foto cadastrada para este processo".to_string(),
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    controller: AttendanceController,
    service: Arc<MockFacialService>,
    camera: Arc<SyntheticCameraState>,
    navigator: Arc<RecordingNavigator>,
    events: broadcast::Receiver<ControllerEvent>,
}

fn mount_with(
    service: Arc<MockFacialService>,
    camera: SyntheticCamera,
    config: ControllerConfig,
) -> Harness {
    let camera_state = camera.state();
    let navigator = Arc::new(RecordingNavigator::new());
    let controller = AttendanceController::builder()
        .case_reference(CASE)
        .camera(camera)
        .facial_service(service.clone())
        .navigator(navigator.clone())
        .config(config)
        .mount()
        .unwrap();
    let events = controller.subscribe();
    Harness {
        controller,
        service,
        camera: camera_state,
        navigator,
        events,
    }
}

fn mount(service: Arc<MockFacialService>) -> Harness {
    mount_with(service, SyntheticCamera::new(), ControllerConfig::default())
}

async fn wait(
    controller: &AttendanceController,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    timeout(Duration::from_secs(60), controller.wait_for(predicate))
        .await
        .expect("timed out waiting for controller state")
        .expect("controller closed")
}

async fn wait_valid(controller: &AttendanceController) -> SessionSnapshot {
    wait(controller, |s| s.can_capture()).await
}

fn is_failed(snapshot: &SessionSnapshot) -> bool {
    matches!(snapshot.state, SessionState::Failed(_))
}

fn drain(events: &mut broadcast::Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

// ============================================================================
// Mounting and device access
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_mount_requires_case_reference() {
    let service = MockFacialService::new();
    let err = AttendanceController::builder()
        .case_reference("   ")
        .camera(SyntheticCamera::new())
        .facial_service(service.clone())
        .mount()
        .unwrap_err();
    assert!(matches!(err, PresencaError::MissingCaseReference));

    let err = AttendanceController::builder()
        .camera(SyntheticCamera::new())
        .facial_service(service.clone())
        .mount()
        .unwrap_err();
    assert_eq!(err.error_code(), "MISSING_CASE_REFERENCE");

    sleep(Duration::from_secs(2)).await;
    assert_eq!(service.quality_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mount_acquires_front_camera_and_polls() {
    let h = mount(MockFacialService::new());

    let snapshot = wait_valid(&h.controller).await;
    assert_eq!(snapshot.state, SessionState::Capturing);
    assert_eq!(snapshot.guidance, "Rosto detectado");
    assert_eq!(snapshot.quality_details.face_count, Some(1));
    assert_eq!(h.camera.live_streams(), 1);

    let request = h.camera.last_request().unwrap();
    assert_eq!(request.resolution.width, 640);
    assert_eq!(request.resolution.height, 480);

    h.controller.unmount().await;
    assert_eq!(h.camera.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_device_failure_is_not_retried() {
    let service = MockFacialService::new();
    let h = mount_with(
        service.clone(),
        SyntheticCamera::denying_permission(),
        ControllerConfig::default(),
    );

    let snapshot = wait(&h.controller, is_failed).await;
    let SessionState::Failed(notice) = &snapshot.state else {
        unreachable!()
    };
    assert_eq!(notice.cause, FailureCause::DeviceAccess);
    assert!(notice.retry_in.is_none());
    assert!(notice.message.contains("câmera"));

    sleep(Duration::from_secs(30)).await;
    assert!(is_failed(&h.controller.snapshot()));
    assert_eq!(h.camera.opened(), 0);
    assert_eq!(service.quality_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_device_failure_on_reacquire() {
    let service = MockFacialService::new();
    service.push_verify(Ok(rejected("no match")));
    let h = mount(service.clone());

    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());
    wait(&h.controller, is_failed).await;

    h.camera.set_permission_denied(true);
    let snapshot = wait(&h.controller, |s| {
        matches!(&s.state, SessionState::Failed(n) if n.cause == FailureCause::DeviceAccess)
    })
    .await;
    assert!(!snapshot.camera_active);
    assert_eq!(h.camera.live_streams(), 0);
}

// ============================================================================
// Quality validation and capture gate
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_three_usable_polls_enable_capture() {
    let h = mount(MockFacialService::new());

    wait(&h.controller, |_| h.service.quality_calls() >= 3).await;
    sleep(Duration::from_millis(10)).await;

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.quality, QualityStatus::Valid);
    assert!(snapshot.can_capture());
}

#[tokio::test(start_paused = true)]
async fn test_quality_polled_at_two_hertz() {
    let h = mount(MockFacialService::new());
    wait_valid(&h.controller).await;
    let before = h.service.quality_calls();

    sleep(Duration::from_millis(2_000)).await;
    let polls = h.service.quality_calls() - before;
    assert!((3..=5).contains(&polls), "unexpected poll count {}", polls);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_valid_polls_required() {
    let config = ControllerConfig {
        required_valid_polls: 3,
        ..ControllerConfig::default()
    };
    let h = mount_with(MockFacialService::new(), SyntheticCamera::new(), config);

    wait(&h.controller, |_| h.service.quality_calls() >= 2).await;
    sleep(Duration::from_millis(10)).await;
    assert_ne!(h.controller.snapshot().quality, QualityStatus::Valid);

    wait_valid(&h.controller).await;
    assert!(h.service.quality_calls() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_capture_ignored_unless_valid() {
    let service = MockFacialService::new();
    service.set_usable(false);
    let h = mount(service.clone());

    let snapshot = wait(&h.controller, |s| s.quality == QualityStatus::Invalid).await;
    assert_eq!(snapshot.guidance, "Aproxime-se da câmera");

    assert_ok!(h.controller.request_capture());
    sleep(Duration::from_secs(5)).await;

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, SessionState::Capturing);
    assert!(snapshot.countdown_remaining.is_none());
    assert_eq!(service.verify_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_validator_outage_is_neutral() {
    let service = MockFacialService::new();
    let h = mount(service.clone());
    wait_valid(&h.controller).await;

    service.set_quality_down(true);
    let snapshot = wait(&h.controller, |s| s.quality == QualityStatus::Neutral).await;
    assert!(snapshot.guidance.is_empty());
    assert_eq!(snapshot.state, SessionState::Capturing);

    assert_ok!(h.controller.request_capture());
    sleep(Duration::from_secs(5)).await;
    assert_eq!(service.verify_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_then_verify() {
    let service = MockFacialService::new();
    *service.verify_delay.lock() = Some(Duration::from_secs(1));
    let mut h = mount(service.clone());
    wait_valid(&h.controller).await;

    assert_ok!(h.controller.request_capture());
    let snapshot = wait(&h.controller, |s| s.countdown_remaining == Some(3)).await;
    assert_eq!(snapshot.state, SessionState::Capturing);

    // a second request while counting down is ignored
    assert_ok!(h.controller.request_capture());

    wait(&h.controller, |s| s.countdown_remaining == Some(1)).await;
    let snapshot = wait(&h.controller, |s| s.state == SessionState::Verifying).await;
    assert_eq!(snapshot.quality, QualityStatus::Neutral);
    assert!(!snapshot.camera_active);
    assert_eq!(h.camera.live_streams(), 0);
    assert!(snapshot.last_frame.is_some());

    wait(&h.controller, |s| s.state == SessionState::Succeeded).await;
    assert_eq!(service.verify_calls(), 1);

    let ticks: Vec<u8> = drain(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            ControllerEvent::CountdownTick { remaining } => Some(remaining),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, vec![3, 2, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_aborts_when_quality_drops() {
    let service = MockFacialService::new();
    let mut h = mount(service.clone());
    wait_valid(&h.controller).await;

    assert_ok!(h.controller.request_capture());
    wait(&h.controller, |s| s.countdown_remaining == Some(2)).await;
    service.set_usable(false);

    sleep(Duration::from_secs(3)).await;
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, SessionState::Capturing);
    assert!(snapshot.countdown_remaining.is_none());
    assert_eq!(service.verify_calls(), 0);
    assert!(drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, ControllerEvent::CaptureAborted)));
}

#[tokio::test(start_paused = true)]
async fn test_auto_capture() {
    let service = MockFacialService::new();
    let config = ControllerConfig {
        auto_capture: true,
        countdown_seconds: 0,
        ..ControllerConfig::default()
    };
    let h = mount_with(service.clone(), SyntheticCamera::new(), config);

    wait(&h.controller, |s| s.state == SessionState::Succeeded).await;
    assert_eq!(service.verify_calls(), 1);
}

// ============================================================================
// Verification outcomes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_verified_confirms_once_and_navigates() {
    let service = MockFacialService::new();
    service.push_verify(Ok(verified("rec-42")));
    let mut h = mount(service.clone());
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());

    let snapshot = wait(&h.controller, |s| s.state == SessionState::Succeeded).await;
    assert_eq!(snapshot.attendance_record_id.as_deref(), Some("rec-42"));
    assert_eq!(snapshot.confidence_score, Some(93.5));
    assert_eq!(snapshot.quality, QualityStatus::Neutral);

    // confirmation waits for the success delay
    sleep(Duration::from_millis(1_000)).await;
    assert!(service.confirmations().is_empty());

    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(service.confirmations(), vec!["rec-42".to_string()]);
    assert_eq!(h.navigator.routes(), vec!["/dashboard".to_string()]);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(service.confirmations().len(), 1);
    assert_eq!(h.navigator.routes().len(), 1);
    assert_eq!(h.camera.live_streams(), 0);

    let events = drain(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        ControllerEvent::AttendanceConfirmed { attendance_record_id, attempts: 1 } if attendance_record_id == "rec-42"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_failure_still_navigates_and_retries() {
    let service = MockFacialService::new();
    service.push_confirm(Err(FacialApiError::Transport {
        reason: "timeout".to_string(),
    }));
    service.push_confirm(Err(FacialApiError::Transport {
        reason: "timeout".to_string(),
    }));
    let mut h = mount(service.clone());
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());
    wait(&h.controller, |s| s.state == SessionState::Succeeded).await;

    sleep(Duration::from_secs(20)).await;
    assert_eq!(service.confirmations().len(), 3);
    assert_eq!(h.navigator.routes(), vec!["/dashboard".to_string()]);
    assert_eq!(h.controller.snapshot().state, SessionState::Succeeded);

    let events = drain(&mut h.events);
    let failures = events
        .iter()
        .filter(|e| matches!(e, ControllerEvent::ConfirmationFailed { .. }))
        .count();
    assert_eq!(failures, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, ControllerEvent::AttendanceConfirmed { attempts: 3, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_verified_without_record_is_unknown_failure() {
    let service = MockFacialService::new();
    service.push_verify(Ok(VerificationOutcome {
        attendance_record_id: None,
        ..verified("unused")
    }));
    let h = mount(service.clone());
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());

    let snapshot = wait(&h.controller, is_failed).await;
    let SessionState::Failed(notice) = &snapshot.state else {
        unreachable!()
    };
    assert!(matches!(
        notice.cause,
        FailureCause::Verification(ErrorClassification::Unknown { .. })
    ));
    assert_eq!(notice.message, "Erro inesperado. Tente novamente.");
    assert_eq!(notice.retry_in, Some(Duration::from_secs(3)));
    assert!(service.confirmations().is_empty());

    sleep(Duration::from_millis(2_900)).await;
    assert!(is_failed(&h.controller.snapshot()));

    sleep(Duration::from_millis(200)).await;
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, SessionState::Capturing);
    assert!(snapshot.camera_active);
    assert!(service.confirmations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejection_returns_to_capture_after_three_seconds() {
    let service = MockFacialService::new();
    service.push_verify(Ok(rejected("no match")));
    let h = mount(service.clone());
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());

    let snapshot = wait(&h.controller, is_failed).await;
    let SessionState::Failed(notice) = &snapshot.state else {
        unreachable!()
    };
    assert_eq!(notice.message, "no match");
    assert_eq!(notice.retry_in, Some(Duration::from_secs(3)));
    assert_eq!(snapshot.quality, QualityStatus::Neutral);
    assert_eq!(h.camera.live_streams(), 0);

    sleep(Duration::from_millis(2_900)).await;
    assert!(is_failed(&h.controller.snapshot()));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(h.controller.snapshot().state, SessionState::Capturing);

    // the loop has resumed; a valid poll re-enables capture
    wait_valid(&h.controller).await;
    assert_eq!(h.camera.live_streams(), 1);
    assert_ok!(h.controller.request_capture());
    wait(&h.controller, |s| s.state == SessionState::Succeeded).await;
    assert_eq!(service.verify_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_waits_five_seconds() {
    let service = MockFacialService::new();
    service.push_verify(Err(FacialApiError::Transport {
        reason: "connection refused".to_string(),
    }));
    let h = mount(service.clone());
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());

    let snapshot = wait(&h.controller, is_failed).await;
    let SessionState::Failed(notice) = &snapshot.state else {
        unreachable!()
    };
    assert_eq!(
        notice.cause,
        FailureCause::Verification(ErrorClassification::NetworkError)
    );

    sleep(Duration::from_millis(3_100)).await;
    assert!(is_failed(&h.controller.snapshot()));
    sleep(Duration::from_millis(1_800)).await;
    assert!(is_failed(&h.controller.snapshot()));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(h.controller.snapshot().state, SessionState::Capturing);
}

// ============================================================================
// Enrollment fallback
// ============================================================================

async fn reach_enrollment(service: Arc<MockFacialService>) -> Harness {
    service.push_verify(Err(no_reference()));
    let h = mount(service);
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());
    wait(&h.controller, |s| {
        s.state == (SessionState::EnrollmentOffered { submitting: false })
    })
    .await;
    h
}

#[tokio::test(start_paused = true)]
async fn test_missing_reference_offers_enrollment() {
    let service = MockFacialService::new();
    let mut h = reach_enrollment(service.clone()).await;

    let snapshot = h.controller.snapshot();
    assert!(!snapshot.camera_active);
    assert_eq!(h.camera.live_streams(), 0);
    let frame = snapshot.last_frame.expect("frame preserved");
    assert!(!frame.is_empty());
    assert_eq!(frame.quality, 95);

    // no automatic retry out of the offer
    sleep(Duration::from_secs(10)).await;
    assert!(h.controller.snapshot().state.is_enrollment());
    assert_eq!(service.verify_calls(), 1);
    assert!(drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, ControllerEvent::EnrollmentOffered)));
}

#[tokio::test(start_paused = true)]
async fn test_enrollment_success_confirms_and_navigates() {
    let service = MockFacialService::new();
    let h = reach_enrollment(service.clone()).await;

    assert_ok!(h.controller.confirm_enrollment());
    let snapshot = wait(&h.controller, |s| s.state == SessionState::Succeeded).await;
    assert_eq!(snapshot.attendance_record_id.as_deref(), Some("rec-9"));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(service.save_calls(), 1);
    assert_eq!(service.confirmations(), vec!["rec-9".to_string()]);
    assert_eq!(h.navigator.routes(), vec!["/dashboard".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_enrollment_without_record_skips_confirmation() {
    let service = MockFacialService::new();
    service.push_save(Ok(enrolled(None)));
    let h = reach_enrollment(service.clone()).await;

    assert_ok!(h.controller.confirm_enrollment());
    wait(&h.controller, |s| s.state == SessionState::Succeeded).await;

    sleep(Duration::from_secs(2)).await;
    assert!(service.confirmations().is_empty());
    assert_eq!(h.navigator.routes(), vec!["/dashboard".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_enrollment_failure_returns_to_capture() {
    let service = MockFacialService::new();
    service.push_save(Ok(EnrollmentOutcome {
        success: false,
        message: Some("Nenhum rosto detectado".to_string()),
        attendance_record_id: None,
        reference_path: None,
    }));
    let h = reach_enrollment(service.clone()).await;

    assert_ok!(h.controller.confirm_enrollment());
    let snapshot = wait(&h.controller, |s| s.state == SessionState::Capturing).await;
    assert_eq!(snapshot.enrollment_error.as_deref(), Some("Nenhum rosto detectado"));
    assert!(snapshot.last_frame.is_none());
    assert!(snapshot.camera_active);
    assert_eq!(h.camera.live_streams(), 1);
    assert!(h.navigator.routes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_enrollment_error_returns_to_capture() {
    let service = MockFacialService::new();
    service.push_save(Err(FacialApiError::Transport {
        reason: "reset".to_string(),
    }));
    let h = reach_enrollment(service.clone()).await;

    assert_ok!(h.controller.confirm_enrollment());
    let snapshot = wait(&h.controller, |s| s.state == SessionState::Capturing).await;
    assert!(snapshot.enrollment_error.is_some());
    wait_valid(&h.controller).await;
}

#[tokio::test(start_paused = true)]
async fn test_double_enrollment_confirm_submits_once() {
    let service = MockFacialService::new();
    *service.save_delay.lock() = Some(Duration::from_secs(1));
    let h = reach_enrollment(service.clone()).await;

    assert_ok!(h.controller.confirm_enrollment());
    assert_ok!(h.controller.confirm_enrollment());
    wait(&h.controller, |s| {
        s.state == (SessionState::EnrollmentOffered { submitting: true })
    })
    .await;
    assert_ok!(h.controller.confirm_enrollment());

    wait(&h.controller, |s| s.state == SessionState::Succeeded).await;
    assert_eq!(service.save_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_decline_then_capture_reaches_verifying() {
    let service = MockFacialService::new();
    *service.verify_delay.lock() = Some(Duration::from_secs(1));
    let h = reach_enrollment(service.clone()).await;

    assert_ok!(h.controller.decline_enrollment());
    let snapshot = wait(&h.controller, |s| s.state == SessionState::Capturing).await;
    assert!(snapshot.last_frame.is_none());

    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());
    wait(&h.controller, |s| s.state == SessionState::Verifying).await;
    assert_eq!(service.verify_calls(), 2);
    assert_eq!(service.save_calls(), 0);
}

// ============================================================================
// Visibility and unmount
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_hidden_page_suspends_capture() {
    let service = MockFacialService::new();
    let h = mount(service.clone());
    wait_valid(&h.controller).await;

    assert_ok!(h.controller.set_visibility(false));
    let snapshot = wait(&h.controller, |s| !s.visible).await;
    assert_eq!(snapshot.state, SessionState::Capturing);
    assert_eq!(snapshot.quality, QualityStatus::Neutral);
    assert!(!snapshot.camera_active);
    assert_eq!(h.camera.live_streams(), 0);

    let polls = service.quality_calls();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(service.quality_calls(), polls);

    assert_ok!(h.controller.set_visibility(true));
    let snapshot = wait(&h.controller, |s| s.visible).await;
    assert!(snapshot.camera_active);
    assert_eq!(h.camera.live_streams(), 1);
    assert_eq!(h.camera.opened(), 2);

    wait_valid(&h.controller).await;
    assert!(service.quality_calls() > polls);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_page_cancels_countdown() {
    let service = MockFacialService::new();
    let h = mount(service.clone());
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());
    wait(&h.controller, |s| s.countdown_remaining == Some(3)).await;

    assert_ok!(h.controller.set_visibility(false));
    sleep(Duration::from_secs(5)).await;
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, SessionState::Capturing);
    assert!(snapshot.countdown_remaining.is_none());
    assert_eq!(service.verify_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_does_not_resurrect_enrollment() {
    let service = MockFacialService::new();
    let h = reach_enrollment(service.clone()).await;

    assert_ok!(h.controller.set_visibility(false));
    assert_ok!(h.controller.set_visibility(true));
    let snapshot = wait(&h.controller, |s| s.visible).await;
    sleep(Duration::from_secs(1)).await;

    assert!(snapshot.state.is_enrollment());
    assert!(h.controller.snapshot().state.is_enrollment());
    assert_eq!(h.camera.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_stream_across_retries() {
    let service = MockFacialService::new();
    service.push_verify(Ok(rejected("no match")));
    service.push_verify(Err(FacialApiError::Transport {
        reason: "down".to_string(),
    }));
    let h = mount(service.clone());

    for _ in 0..2 {
        wait_valid(&h.controller).await;
        assert!(h.camera.live_streams() <= 1);
        assert_ok!(h.controller.request_capture());
        wait(&h.controller, is_failed).await;
        assert_eq!(h.camera.live_streams(), 0);
        wait(&h.controller, |s| s.state == SessionState::Capturing).await;
        assert_eq!(h.camera.live_streams(), 1);
    }
    assert_eq!(h.camera.opened(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_results_after_unmount_are_dropped() {
    let service = MockFacialService::new();
    *service.verify_delay.lock() = Some(Duration::from_secs(2));
    let h = mount(service.clone());
    wait_valid(&h.controller).await;
    assert_ok!(h.controller.request_capture());
    wait(&h.controller, |s| s.state == SessionState::Verifying).await;

    let navigator = h.navigator.clone();
    let camera = h.camera.clone();
    let watcher = h.controller.watch();
    h.controller.unmount().await;

    sleep(Duration::from_secs(10)).await;
    assert_eq!(service.verify_calls(), 1);
    assert!(service.confirmations().is_empty());
    assert!(navigator.routes().is_empty());
    assert_eq!(camera.live_streams(), 0);

    let last = watcher.borrow().clone();
    assert!(!last.mounted);
    assert_eq!(last.state, SessionState::Verifying);
    assert!(last.last_frame.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_unmounts() {
    let h = mount(MockFacialService::new());
    wait_valid(&h.controller).await;
    let mut watcher = h.controller.watch();
    let camera = h.camera.clone();
    drop(h);

    let closed = timeout(Duration::from_secs(5), watcher.wait_for(|s| !s.mounted)).await;
    assert!(matches!(closed, Ok(Ok(_))));
    assert_eq!(camera.live_streams(), 0);

    assert_err!(AttendanceController::builder()
        .case_reference("")
        .facial_service(MockFacialService::new())
        .mount());
}
