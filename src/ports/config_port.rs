//! Configuration access port trait.

use crate::domain::error::SigtraderError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// `default` when the key is absent; a present value that does not parse is an error.
    fn get_f64(&self, section: &str, key: &str, default: f64) -> Result<f64, SigtraderError> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    let reason = format!("'{}' is not a number", raw.trim());
                    SigtraderError::invalid(section, key, reason)
                }),
        }
    }

    /// Non-negative integer with the same strictness as `get_f64`.
    fn get_usize(&self, section: &str, key: &str, default: usize) -> Result<usize, SigtraderError> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                SigtraderError::invalid(
                    section,
                    key,
                    format!("'{}' is not a non-negative integer", raw.trim()),
                )
            }),
        }
    }

    fn require_string(&self, section: &str, key: &str) -> Result<String, SigtraderError> {
        match self.get_string(section, key) {
            Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(SigtraderError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            }),
        }
    }
}
