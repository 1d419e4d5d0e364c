//! Replay a synthetic session: upright, then a sustained slouch, then a
//! keypoint source outage handled by degraded mode

use posture_flux::{Frame, Keypoint, Landmark, PostureSession, FLUX_VERSION};

fn frame(timestamp_ms: i64, lean: f64) -> Frame {
    let dx = 0.3 * lean.to_radians().tan();
    Frame::new(timestamp_ms)
        .with(Landmark::Nose, Keypoint::new(0.5 + dx, 0.2, 0.0))
        .with(Landmark::LeftEar, Keypoint::new(0.55 + dx, 0.25, 0.0))
        .with(Landmark::RightEar, Keypoint::new(0.45 + dx, 0.25, 0.0))
        .with(Landmark::LeftShoulder, Keypoint::new(0.6 + dx, 0.4, 0.0))
        .with(Landmark::RightShoulder, Keypoint::new(0.4 + dx, 0.4, 0.0))
        .with(Landmark::LeftHip, Keypoint::new(0.58, 0.7, 0.0))
        .with(Landmark::RightHip, Keypoint::new(0.42, 0.7, 0.0))
}

fn main() {
    println!("posture-flux {FLUX_VERSION}");
    let mut session = PostureSession::new();

    for i in 0..60 {
        let ts = i * 200;
        let lean = if i < 15 { 0.0 } else { 22.0 };
        let output = session.tick(&frame(ts, lean));
        if let Some(alert) = &output.alert {
            println!("{ts:>6} ms  ALERT {:<12} {}", alert.alert_type.as_str(), alert.message);
        } else if i % 10 == 0 {
            println!(
                "{ts:>6} ms  score {:5.1}  fatigue {:5.1}  risk {}",
                output.result.score,
                output.result.fatigue,
                output.risk.as_str()
            );
        }
    }

    session.enter_degraded(12_000);
    for i in 0..5 {
        let ts = 12_000 + i * 1000;
        let output = session.tick_degraded(ts);
        println!(
            "{ts:>6} ms  score {:5.1}  risk {}  (fallback)",
            output.result.score,
            output.risk.as_str()
        );
    }

    match serde_json::to_string_pretty(session.summary()) {
        Ok(summary) => println!("{summary}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
