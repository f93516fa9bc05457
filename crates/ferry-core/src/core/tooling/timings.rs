use std::sync::OnceLock;
use std::time::Instant;

use crate::config::TIMINGS_ENV;

fn timings_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(TIMINGS_ENV)
            .ok()
            .is_some_and(|raw| flag_value_enabled(&raw))
    })
}

fn flag_value_enabled(raw: &str) -> bool {
    let value = raw.trim();
    !value.is_empty()
        && !matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        )
}

/// Logs the wall time of a migration phase when `FERRY_TIMINGS` is set.
pub(crate) struct TimingGuard {
    label: &'static str,
    start: Instant,
}

impl TimingGuard {
    pub(crate) fn new(label: &'static str) -> Option<Self> {
        if timings_enabled() {
            Some(Self {
                label,
                start: Instant::now(),
            })
        } else {
            None
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::info!(
            ferry_timing = self.label,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "timing"
        );
    }
}
