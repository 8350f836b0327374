use std::thread::sleep;
use std::time::Duration;

use mr24fdb1::{BodySignThresholds, DecodedEvent, MR24FDB1};

/// Prints every body-sign classification the radar reports.
///
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Opening serial device");
    let mut radar = MR24FDB1::open("/dev/ttyAMA10", mr24fdb1::DEFAULT_BAUD, Duration::from_millis(100))?;
    let thresholds = BodySignThresholds { move_min: 1.0, move_max: 15.0 };
    println!("Ready");
    sleep(Duration::from_millis(1500));
    loop {
        match radar.poll(&thresholds) {
            Ok(Some(report)) => {
                if let DecodedEvent::BodyMovement { magnitude, classification } = report.event {
                    println!("{}", report.frame);
                    println!("BodySign: {magnitude:.2} -> {classification:?}");
                }
            }
            Ok(None) => sleep(Duration::from_millis(10)),
            Err(e) if e.is_transport() => return Err(e.into()),
            Err(e) => eprintln!("{e}"),
        }
    }
}
