//! Per-column Scalar Register File and the cross-slot arbitration that
//! decides, each cycle, which slot's value actually lands in it.

use crate::consts::SRF_N_REGS;
use crate::error::ArbitrationError;

#[derive(Debug, Clone)]
pub struct Srf {
    regs: [i32; SRF_N_REGS],
}

impl Default for Srf {
    fn default() -> Self {
        Self::new()
    }
}

impl Srf {
    pub fn new() -> Self {
        Self {
            regs: [0; SRF_N_REGS],
        }
    }

    pub fn read(&self, idx: usize) -> i32 {
        self.regs[idx]
    }

    pub fn write(&mut self, idx: usize, value: i32) {
        self.regs[idx] = value;
    }

    pub fn as_slice(&self) -> &[i32; SRF_N_REGS] {
        &self.regs
    }

    pub fn as_mut_slice(&mut self) -> &mut [i32; SRF_N_REGS] {
        &mut self.regs
    }
}

/// Identifies which slot's ALU result is committed to the SRF this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrfWriteSource {
    Lcu,
    Rc0,
    Mxcu,
    Lsu,
}

/// A slot's SRF access request for the current cycle. `-1` (`None`) means
/// "no access".
#[derive(Debug, Clone, Copy, Default)]
pub struct SrfAccess {
    pub read_idx: Option<usize>,
    pub write_idx: Option<usize>,
}

/// Result of arbitrating one cycle's worth of SRF accesses across LCU,
/// LSU, and the four RCs of a column.
#[derive(Debug, Clone, Copy)]
pub struct Arbitration {
    pub srf_sel: usize,
    pub srf_we: bool,
    pub write_source: SrfWriteSource,
}

/// Arbitrate a cycle's SRF accesses.
///
/// `rc` is indexed by row (row 0 is the only row allowed to write). Mirrors
/// `SRF.checkReadsWrites` field-for-field, including its write-source
/// precedence: RC0's claim is the default once present, LCU's overrides it,
/// and LSU's overrides both.
pub fn arbitrate(
    lcu: SrfAccess,
    lsu: SrfAccess,
    rc: &[SrfAccess],
) -> Result<Arbitration, ArbitrationError> {
    for (row, access) in rc.iter().enumerate().skip(1) {
        if access.write_idx.is_some() {
            return Err(ArbitrationError::NonRow0Write);
        }
        let _ = row;
    }

    let reads: Vec<usize> = rc
        .iter()
        .chain([&lcu, &lsu])
        .filter_map(|a| a.read_idx)
        .collect();
    let unique_reads: std::collections::HashSet<usize> = reads.iter().copied().collect();
    if unique_reads.len() > 1 {
        return Err(ArbitrationError::DivergentReads);
    }

    let writes: Vec<usize> = rc
        .iter()
        .chain([&lcu, &lsu])
        .filter_map(|a| a.write_idx)
        .collect();
    if writes.len() > 1 {
        return Err(ArbitrationError::DivergentWrites);
    }

    if let (Some(&r), Some(&w)) = (unique_reads.iter().next(), writes.first()) {
        if r != *w {
            return Err(ArbitrationError::ReadWriteMismatch);
        }
    }

    let mut write_source = SrfWriteSource::Lcu;
    if rc[0].write_idx.is_some() {
        write_source = SrfWriteSource::Rc0;
    }
    if lcu.write_idx.is_some() {
        write_source = SrfWriteSource::Lcu;
    }
    if lsu.write_idx.is_some() {
        write_source = SrfWriteSource::Lsu;
    }

    let srf_sel = writes
        .first()
        .copied()
        .or_else(|| unique_reads.iter().next().copied())
        .unwrap_or(0);
    let srf_we = !writes.is_empty();

    Ok(Arbitration {
        srf_sel,
        srf_we,
        write_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> SrfAccess {
        SrfAccess::default()
    }

    #[test]
    fn non_row0_write_rejected() {
        let rc = vec![none(), SrfAccess { read_idx: None, write_idx: Some(2) }, none(), none()];
        assert_eq!(
            arbitrate(none(), none(), &rc),
            Err(ArbitrationError::NonRow0Write)
        );
    }

    #[test]
    fn divergent_reads_rejected() {
        let rc = vec![
            SrfAccess { read_idx: Some(1), write_idx: None },
            none(),
            none(),
            none(),
        ];
        let lcu = SrfAccess { read_idx: Some(2), write_idx: None };
        assert_eq!(
            arbitrate(lcu, none(), &rc),
            Err(ArbitrationError::DivergentReads)
        );
    }

    #[test]
    fn lsu_write_wins_when_it_is_the_only_writer() {
        let rc = vec![none(), none(), none(), none()];
        let lcu = none();
        let lsu = SrfAccess { read_idx: None, write_idx: Some(3) };
        let a = arbitrate(lcu, lsu, &rc).unwrap();
        assert_eq!(a.write_source, SrfWriteSource::Lsu);
        assert!(a.srf_we);
        assert_eq!(a.srf_sel, 3);
    }

    #[test]
    fn same_index_multi_write_is_still_rejected() {
        let rc = vec![
            SrfAccess { read_idx: None, write_idx: Some(3) },
            none(),
            none(),
            none(),
        ];
        let lcu = SrfAccess { read_idx: None, write_idx: Some(3) };
        let lsu = SrfAccess { read_idx: None, write_idx: Some(3) };
        assert_eq!(
            arbitrate(lcu, lsu, &rc),
            Err(ArbitrationError::DivergentWrites)
        );
    }

    #[test]
    fn rc0_write_alone_selected() {
        let rc = vec![
            SrfAccess { read_idx: None, write_idx: Some(5) },
            none(),
            none(),
            none(),
        ];
        let a = arbitrate(none(), none(), &rc).unwrap();
        assert_eq!(a.write_source, SrfWriteSource::Rc0);
    }
}
