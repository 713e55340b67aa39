//! Array sizes and fixed constants of the VWR2A CGRA grid.

/// Number of columns in the CGRA grid.
pub const CGRA_COLS: usize = 2;
/// Number of rows in the CGRA grid (and of RCs per column).
pub const CGRA_ROWS: usize = 4;

/// Largest value representable by a 32-bit two's complement word.
pub const MAX_32B: i32 = 0x7FFF_FFFF;
/// Smallest value representable by a 32-bit two's complement word.
pub const MIN_32B: i32 = -0x8000_0000;

/// Number of scalar registers held by each column's SRF.
pub const SRF_N_REGS: usize = 8;

/// Number of 32-bit words per SPM line.
pub const SPM_NWORDS: usize = 128;
/// Number of lines in the scratchpad memory.
pub const SPM_NLINES: usize = 64;

/// Number of Vector Working Registers per column.
pub const N_VWR_PER_COL: usize = 3;
/// Number of 32-bit elements held by each VWR.
pub const N_ELEMS_PER_VWR: usize = 128;

/// Number of lines in the global instruction memory, per slot kind.
pub const IMEM_N_LINES: usize = 512;

/// Number of configuration registers in the kernel memory.
pub const KER_CONF_N_REG: usize = 16;
/// Bit width of a kernel-memory configuration word.
pub const KMEM_IMEM_WIDTH: u32 = 21;

/// Number of 32-bit elements owned by a single RC row's slice of a VWR.
pub const fn vwr_row_slice_size() -> usize {
    SPM_NWORDS / CGRA_ROWS
}
