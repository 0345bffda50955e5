//! Key-value settings seam. Hosts own persistence; the core only reads
//! and writes through this interface.

use std::collections::HashMap;

/// Persisted "seconds to process" knob for the start-gap processor.
pub const FIX_START_SECONDS_KEY: &str = "dataprocess/fixstart/seconds";

pub const FIX_START_SECONDS_DEFAULT: f64 = 10.0;

pub trait Settings {
    fn value_f64(&self, key: &str, default: f64) -> f64;

    fn set_value_f64(&mut self, key: &str, value: f64);
}

/// In-memory settings store used by tests and stand-alone hosts.
#[derive(Clone, Debug, Default)]
pub struct MemorySettings {
    values: HashMap<String, f64>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: HashMap<String, f64>) -> Self {
        Self { values }
    }
}

impl Settings for MemorySettings {
    fn value_f64(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    fn set_value_f64(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_when_unset() {
        let settings = MemorySettings::new();
        assert_eq!(
            settings.value_f64(FIX_START_SECONDS_KEY, FIX_START_SECONDS_DEFAULT),
            10.0
        );
    }

    #[test]
    fn set_then_read() {
        let mut settings = MemorySettings::new();
        settings.set_value_f64(FIX_START_SECONDS_KEY, 12.5);
        assert_eq!(settings.value_f64(FIX_START_SECONDS_KEY, 10.0), 12.5);
    }
}
