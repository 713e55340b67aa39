//! Global instruction memory: one 512-line table per slot kind, shared by
//! both columns, plus the per-row RC tables.

use crate::consts::{CGRA_ROWS, IMEM_N_LINES};

/// Raw (encoded) instruction words for one slot kind across the whole
/// global IMEM address space.
#[derive(Debug, Clone)]
pub struct SlotImem {
    words: Vec<u32>,
}

impl Default for SlotImem {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotImem {
    pub fn new() -> Self {
        Self {
            words: vec![0; IMEM_N_LINES],
        }
    }

    pub fn get(&self, addr: usize) -> u32 {
        self.words[addr]
    }

    pub fn set(&mut self, addr: usize, word: u32) {
        self.words[addr] = word;
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.words
    }
}

/// Global instruction memory for every slot kind.
#[derive(Debug, Clone)]
pub struct Imem {
    pub lcu: SlotImem,
    pub lsu: SlotImem,
    pub mxcu: SlotImem,
    pub rcs: [SlotImem; CGRA_ROWS],
}

impl Default for Imem {
    fn default() -> Self {
        Self::new()
    }
}

impl Imem {
    pub fn new() -> Self {
        Self {
            lcu: SlotImem::new(),
            lsu: SlotImem::new(),
            mxcu: SlotImem::new(),
            rcs: std::array::from_fn(|_| SlotImem::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let mut imem = Imem::new();
        imem.lcu.set(10, 0xABCDE);
        assert_eq!(imem.lcu.get(10), 0xABCDE);
        imem.rcs[2].set(5, 7);
        assert_eq!(imem.rcs[2].get(5), 7);
    }
}
