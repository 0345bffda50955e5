//! Post-processor contract and registry.

use crate::fix_start::FixStart;
use crate::settings::Settings;
use crate::{RideFile, RideFixError};

/// Explicit per-invocation configuration, supplied when a host runs a
/// processor manually. Automatic runs pass `None` and defaults come from
/// the settings provider instead.
#[derive(Clone, Copy, Debug)]
pub struct ProcessorConfig {
    pub seconds_to_process: f64,
}

/// A ride post-processing step. Implementations mutate the ride in place
/// through its command seam and report whether anything changed.
pub trait DataProcessor: Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn post_process(
        &self,
        ride: &mut RideFile,
        config: Option<&ProcessorConfig>,
        settings: &dyn Settings,
    ) -> Result<bool, RideFixError>;
}

static FIX_START: FixStart = FixStart;

static PROCESSORS: [&dyn DataProcessor; 1] = [&FIX_START];

/// Built-in processors in registration order.
pub fn processors() -> &'static [&'static dyn DataProcessor] {
    &PROCESSORS
}

pub fn processor_for_name(name: &str) -> Result<&'static dyn DataProcessor, RideFixError> {
    processors()
        .iter()
        .copied()
        .find(|p| p.name() == name)
        .ok_or_else(|| RideFixError::UnknownProcessor(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_fix_start() {
        let names: Vec<&str> = processors().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Remove Bad Start Values"]);
    }

    #[test]
    fn lookup_by_name() {
        let processor = processor_for_name("Remove Bad Start Values").unwrap();
        assert!(!processor.description().is_empty());
    }

    #[test]
    fn lookup_unknown_name() {
        let err = processor_for_name("Polish Chrome").unwrap_err();
        assert!(matches!(err, RideFixError::UnknownProcessor(_)));
    }
}
