//! Attendance Confirmation Demo
//!
//! Mounts a controller for the case given on the command line against the
//! face service at `PRESENCA_FACIAL_API_URL` (default `http://localhost:5000`),
//! prints every status change, and dumps the session report at the end.
//!
//! ```text
//! cargo run --example confirm_attendance -- 0001234-56.2024.8.05.0001
//! PRESENCA_CONFIG=presenca.toml cargo run --example confirm_attendance --features native-camera -- 123/2024
//! ```

use anyhow::Context;
use presenca::{
    init_logging, AttendanceController, ControllerEvent, HttpFacialService, PresencaConfig,
    ServiceProbe, SessionReport, StatusView,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = match std::env::var("PRESENCA_CONFIG") {
        Ok(path) => PresencaConfig::load(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => PresencaConfig::from_env(),
    };
    init_logging(&config.logging)?;

    let case_reference = std::env::args().nth(1).unwrap_or_default();
    if case_reference.trim().is_empty() {
        let view = StatusView::missing_case_reference();
        println!("⚠️  {}: {}", view.title, view.description);
        return Ok(());
    }

    println!("🧑‍⚖️ Presença - Attendance Confirmation Demo");
    println!("==========================================");

    let service = HttpFacialService::new(&config.facial)?;
    let probe = ServiceProbe::new(service.clone())
        .wait_until_healthy(3, Duration::from_secs(1))
        .await;
    if !probe.healthy {
        println!(
            "❌ Face service at {} is not healthy: {}",
            service.base_url(),
            probe.error.as_deref().unwrap_or("unexpected status")
        );
        return Ok(());
    }
    println!("✅ Face service healthy ({:?})", probe.latency);

    // Headless: capture as soon as the frame is usable
    config.controller.auto_capture = true;

    let controller = AttendanceController::builder()
        .case_reference(case_reference.as_str())
        .facial_service(Arc::new(service))
        .config(config.controller)
        .mount()?;

    let report = tokio::spawn(SessionReport::new(case_reference.as_str()).collect(controller.subscribe()));
    let mut events = controller.subscribe();
    let mut last_view = None;

    loop {
        let event = match tokio::time::timeout(Duration::from_secs(120), events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) | Err(_) => break,
        };

        let view = StatusView::for_snapshot(&controller.snapshot());
        if last_view.as_ref() != Some(&view) {
            println!("📋 {} - {}", view.title, view.description);
            last_view = Some(view);
        }

        match event {
            ControllerEvent::EnrollmentOffered => {
                println!("📸 No reference image on file, enrolling this frame");
                controller.confirm_enrollment()?;
            }
            ControllerEvent::Navigated { route } => {
                println!("➡️  Redirecting to {}", route);
                break;
            }
            ControllerEvent::DeviceFailed { reason } => {
                println!("❌ Camera unavailable: {}", reason);
                break;
            }
            _ => {}
        }
    }

    // let an out-of-band confirmation retry finish before tearing down
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(events);
    controller.unmount().await;

    let report = tokio::time::timeout(Duration::from_secs(30), report)
        .await
        .context("session report did not finish")??;
    println!("\n{}", report.to_json()?);
    Ok(())
}
