//! Scratchpad memory: the global store backing VWR loads/stores and the
//! SRF's initial contents.

use crate::consts::{SPM_NLINES, SPM_NWORDS};
use crate::error::SimError;

/// A 64-line by 128-word scratchpad memory, shared by both columns.
#[derive(Debug, Clone)]
pub struct Spm {
    lines: Vec<[i32; SPM_NWORDS]>,
}

impl Default for Spm {
    fn default() -> Self {
        Self::new()
    }
}

impl Spm {
    pub fn new() -> Self {
        Self {
            lines: vec![[0i32; SPM_NWORDS]; SPM_NLINES],
        }
    }

    pub fn set_line(&mut self, nline: usize, vector: &[i32]) -> Result<(), SimError> {
        if nline >= SPM_NLINES {
            return Err(SimError::SpmLineRange(nline, SPM_NLINES));
        }
        if vector.len() != SPM_NWORDS {
            return Err(SimError::SpmLineRange(nline, SPM_NLINES));
        }
        self.lines[nline].copy_from_slice(vector);
        Ok(())
    }

    pub fn get_line(&self, nline: usize) -> Result<&[i32; SPM_NWORDS], SimError> {
        self.lines
            .get(nline)
            .ok_or(SimError::SpmLineRange(nline, SPM_NLINES))
    }

    /// Load a sequence of full lines starting at line 0, matching
    /// `loadSPMData`'s sequential-fill behaviour.
    pub fn load_data<'a>(&mut self, data: impl IntoIterator<Item = &'a [i32]>) -> Result<(), SimError> {
        for (nline, vector) in data.into_iter().enumerate() {
            self.set_line(nline, vector)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_line_roundtrip() {
        let mut spm = Spm::new();
        let v = [7i32; SPM_NWORDS];
        spm.set_line(3, &v).unwrap();
        assert_eq!(spm.get_line(3).unwrap(), &v);
    }

    #[test]
    fn out_of_range_line_errors() {
        let mut spm = Spm::new();
        assert!(spm.set_line(SPM_NLINES, &[0i32; SPM_NWORDS]).is_err());
        assert!(spm.get_line(SPM_NLINES).is_err());
    }
}
