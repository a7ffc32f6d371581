//! Resolution selection

use super::source::Resolution;
use crate::error::StartupError;

/// Bounds on acceptable frame sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionFilter {
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Pick the smallest match instead of the largest
    pub smallest: bool,
}

impl ResolutionFilter {
    /// Reject bounds that can never match
    pub fn validate(&self) -> Result<(), StartupError> {
        if let (Some(min), Some(max)) = (self.min_width, self.max_width) {
            if min > max {
                return Err(StartupError::InvalidConstraints(format!(
                    "min width {} exceeds max width {}",
                    min, max
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_height, self.max_height) {
            if min > max {
                return Err(StartupError::InvalidConstraints(format!(
                    "min height {} exceeds max height {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    pub fn accepts(&self, size: &Resolution) -> bool {
        self.max_width.map_or(true, |w| size.width <= w)
            && self.max_height.map_or(true, |h| size.height <= h)
            && self.min_width.map_or(true, |w| size.width >= w)
            && self.min_height.map_or(true, |h| size.height >= h)
    }

    /// Choose a size from `available` (ascending order)
    pub fn select(&self, available: &[Resolution]) -> Result<Resolution, StartupError> {
        self.validate()?;

        let mut matching = available.iter().filter(|s| self.accepts(s));
        let chosen = if self.smallest {
            matching.next()
        } else {
            matching.last()
        };

        chosen.copied().ok_or_else(|| StartupError::NoMatchingResolution {
            available: available.to_vec(),
        })
    }
}
