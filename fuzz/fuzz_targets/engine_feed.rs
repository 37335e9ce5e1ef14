//! Fuzz target for full engine dispatch.
//!
//! Drives a persistent engine with arbitrary lines: CAP, 005, and
//! identity churn paths must degrade gracefully, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_engine::Engine;
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        let mut engine = Engine::new();
        let _ = engine.begin_negotiation();
        for line in input.lines().take(64) {
            if line.len() > 512 {
                continue;
            }
            let _ = engine.feed_line(line);
        }
    }
});
