#![no_main]
use libfuzzer_sys::fuzz_target;
use rotator_config::{TransferFit, TransferRow};

fuzz_target!(|pairs: Vec<(f32, f32)>| {
    let rows: Vec<TransferRow> = pairs
        .into_iter()
        .map(|(command, measured)| TransferRow { command, measured })
        .collect();
    if let Ok(fit) = TransferFit::from_rows(&rows) {
        assert!(fit.positive.slope > 0.0 && fit.negative.slope > 0.0);
    }
});
