//! Kernel memory: tracks which kernels are loaded into the global IMEM.

use crate::bits::{extract, insert};
use crate::consts::{KER_CONF_N_REG, SPM_NLINES};
use crate::error::SimError;
use std::fmt;

/// One-hot encoding of which column(s) a kernel occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnUsage {
    Col0,
    Col1,
    Both,
}

impl ColumnUsage {
    pub fn from_one_hot(value: u32) -> Result<Self, SimError> {
        match value {
            1 => Ok(Self::Col0),
            2 => Ok(Self::Col1),
            3 => Ok(Self::Both),
            other => Err(SimError::InvalidColumnUsage(other)),
        }
    }

    pub fn to_one_hot(self) -> u32 {
        match self {
            Self::Col0 => 1,
            Self::Col1 => 2,
            Self::Both => 3,
        }
    }

    /// `(start_col, end_col)` inclusive range of columns this kernel runs on.
    pub fn col_range(self) -> (usize, usize) {
        match self {
            Self::Col0 => (0, 0),
            Self::Col1 => (1, 1),
            Self::Both => (0, 1),
        }
    }
}

/// First-class input for configuring one kernel slot, validated on
/// construction the way `KMEM.addKernel` validates its raw arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    pub column_usage: ColumnUsage,
    pub num_instructions_per_col: u8,
    pub imem_add_start: u16,
    pub srf_spm_address: u8,
}

/// One kernel-memory configuration word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmemWord {
    /// Number of instructions per column, already decremented by one as
    /// stored in the word (add one to get the real instruction count).
    pub num_instructions_minus_one: u32,
    pub imem_add_start: u32,
    pub column_usage: u32,
    pub srf_spm_address: u32,
}

const NUM_INSTR_SHIFT: u32 = 0;
const NUM_INSTR_WIDTH: u32 = 6;
const IMEM_ADD_SHIFT: u32 = 6;
const IMEM_ADD_WIDTH: u32 = 9;
const COL_USAGE_SHIFT: u32 = 15;
const COL_USAGE_WIDTH: u32 = 2;
const SRF_SPM_SHIFT: u32 = 17;
const SRF_SPM_WIDTH: u32 = 4;

impl KmemWord {
    pub fn encode(&self) -> u32 {
        insert(self.num_instructions_minus_one, NUM_INSTR_SHIFT, NUM_INSTR_WIDTH)
            | insert(self.imem_add_start, IMEM_ADD_SHIFT, IMEM_ADD_WIDTH)
            | insert(self.column_usage, COL_USAGE_SHIFT, COL_USAGE_WIDTH)
            | insert(self.srf_spm_address, SRF_SPM_SHIFT, SRF_SPM_WIDTH)
    }

    pub fn decode(word: u32) -> Self {
        Self {
            num_instructions_minus_one: extract(word, NUM_INSTR_SHIFT, NUM_INSTR_WIDTH),
            imem_add_start: extract(word, IMEM_ADD_SHIFT, IMEM_ADD_WIDTH),
            column_usage: extract(word, COL_USAGE_SHIFT, COL_USAGE_WIDTH),
            srf_spm_address: extract(word, SRF_SPM_SHIFT, SRF_SPM_WIDTH),
        }
    }
}

/// Human-readable summary of a loaded kernel, mirroring `get_kernel_info`.
#[derive(Debug, Clone)]
pub struct KernelInfo {
    pub num_instructions: u32,
    pub imem_add_start: u32,
    pub column_usage: ColumnUsage,
    pub srf_spm_address: u32,
}

impl fmt::Display for KernelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col_disp = match self.column_usage {
            ColumnUsage::Col0 => "0".to_string(),
            ColumnUsage::Col1 => "1".to_string(),
            ColumnUsage::Both => "both".to_string(),
        };
        write!(
            f,
            "This kernel uses {} instruction words starting at IMEM address {}.\n\
             It uses column(s): {}.\nThe SRF is located in SPM bank {}.",
            self.num_instructions, self.imem_add_start, col_disp, self.srf_spm_address
        )
    }
}

/// Kernel configuration memory: `KER_CONF_N_REG` slots, index 0 reserved.
#[derive(Debug, Clone)]
pub struct Kmem {
    slots: [u32; KER_CONF_N_REG],
}

impl Default for Kmem {
    fn default() -> Self {
        Self::new()
    }
}

impl Kmem {
    pub fn new() -> Self {
        Self {
            slots: [0; KER_CONF_N_REG],
        }
    }

    /// Validate and install a [`KernelConfig`] into `kernel_number`.
    pub fn configure(&mut self, config: KernelConfig, kernel_number: usize) -> Result<(), SimError> {
        self.add_kernel(
            config.num_instructions_per_col as u32,
            config.imem_add_start as u32,
            config.column_usage,
            config.srf_spm_address as u32,
            kernel_number,
        )
    }

    pub fn add_kernel(
        &mut self,
        num_instructions_per_col: u32,
        imem_add_start: u32,
        column_usage: ColumnUsage,
        srf_spm_address: u32,
        kernel_number: usize,
    ) -> Result<(), SimError> {
        if kernel_number == 0 {
            tracing::warn!("kernel slot 0 is reserved and cannot be configured");
            return Err(SimError::ReservedKernelSlot(kernel_number));
        }
        if kernel_number >= KER_CONF_N_REG {
            return Err(SimError::KernelSlotRange(kernel_number, KER_CONF_N_REG));
        }
        if num_instructions_per_col == 0 || num_instructions_per_col >= 64 {
            return Err(SimError::InstructionCountRange(num_instructions_per_col));
        }
        if srf_spm_address as usize >= SPM_NLINES {
            return Err(SimError::SrfBankRange(srf_spm_address as usize, SPM_NLINES));
        }

        let word = KmemWord {
            num_instructions_minus_one: num_instructions_per_col - 1,
            imem_add_start,
            column_usage: column_usage.to_one_hot(),
            srf_spm_address,
        };
        self.slots[kernel_number] = word.encode();
        Ok(())
    }

    pub fn get_params(&self, kernel_number: usize) -> Result<KmemWord, SimError> {
        self.slots
            .get(kernel_number)
            .copied()
            .map(KmemWord::decode)
            .ok_or(SimError::KernelSlotRange(kernel_number, KER_CONF_N_REG))
    }

    pub fn kernel_info(&self, kernel_number: usize) -> Result<KernelInfo, SimError> {
        let w = self.get_params(kernel_number)?;
        Ok(KernelInfo {
            num_instructions: w.num_instructions_minus_one + 1,
            imem_add_start: w.imem_add_start,
            column_usage: ColumnUsage::from_one_hot(w.column_usage)?,
            srf_spm_address: w.srf_spm_address,
        })
    }

    pub fn word_hex(&self, kernel_number: usize) -> Result<String, SimError> {
        self.slots
            .get(kernel_number)
            .map(|w| format!("{:#x}", w))
            .ok_or(SimError::KernelSlotRange(kernel_number, KER_CONF_N_REG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kmem_word_roundtrip() {
        let w = KmemWord {
            num_instructions_minus_one: 9,
            imem_add_start: 200,
            column_usage: 3,
            srf_spm_address: 5,
        };
        assert_eq!(KmemWord::decode(w.encode()), w);
    }

    #[test]
    fn add_kernel_rejects_reserved_slot() {
        let mut k = Kmem::new();
        assert!(k
            .add_kernel(4, 0, ColumnUsage::Both, 0, 0)
            .is_err());
    }

    #[test]
    fn add_kernel_and_read_back_info() {
        let mut k = Kmem::new();
        k.add_kernel(10, 64, ColumnUsage::Col1, 3, 1).unwrap();
        let info = k.kernel_info(1).unwrap();
        assert_eq!(info.num_instructions, 10);
        assert_eq!(info.imem_add_start, 64);
        assert_eq!(info.column_usage, ColumnUsage::Col1);
        assert_eq!(info.srf_spm_address, 3);
    }
}
