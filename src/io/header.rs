//! C header emitter: writes the five `uint32_t[]` bitstream arrays the
//! hardware build consumes, in the same order and bracing as the
//! reference tool's `dsip_bitstream.h`.

use std::io::Write;

use crate::cgra::Cgra;
use crate::consts::{CGRA_ROWS, IMEM_N_LINES, KER_CONF_N_REG};
use crate::error::IoError;

fn write_array(dst: &mut impl Write, name: &str, size_expr: &str, words: &[u32]) -> Result<(), IoError> {
    writeln!(dst, "uint32_t {}[{}] = {{", name, size_expr).map_err(IoError::Io)?;
    for (i, word) in words.iter().enumerate() {
        let sep = if i + 1 < words.len() { "," } else { "" };
        writeln!(dst, "  {:#x}{}", word, sep).map_err(IoError::Io)?;
    }
    writeln!(dst, "}};\n").map_err(IoError::Io)?;
    Ok(())
}

/// Write the whole `dsip_bitstream.h` contents for the CGRA's current
/// kernel memory and global IMEM state.
pub fn write_bitstream_header(dst: &mut impl Write, cgra: &Cgra) -> Result<(), IoError> {
    writeln!(
        dst,
        "#ifndef _DSIP_BITSTREAM_H_\n#define _DSIP_BITSTREAM_H_\n\n#include <stdint.h>\n\n#include \"dsip.h\"\n"
    )
    .map_err(IoError::Io)?;

    let kmem_words: Vec<u32> = (0..KER_CONF_N_REG)
        .map(|i| cgra.kmem.word_hex(i).ok().and_then(|s| u32::from_str_radix(s.trim_start_matches("0x"), 16).ok()).unwrap_or(0))
        .collect();
    write_array(dst, "dsip_kmem_bitstream", "DSIP_KMEM_SIZE", &kmem_words)?;

    write_array(dst, "dsip_lcu_imem_bitstream", "DSIP_IMEM_SIZE", cgra.imem.lcu.as_slice())?;
    write_array(dst, "dsip_lsu_imem_bitstream", "DSIP_IMEM_SIZE", cgra.imem.lsu.as_slice())?;
    write_array(dst, "dsip_mxcu_imem_bitstream", "DSIP_IMEM_SIZE", cgra.imem.mxcu.as_slice())?;

    let mut rcs_words = Vec::with_capacity(CGRA_ROWS * IMEM_N_LINES);
    for row in 0..CGRA_ROWS {
        rcs_words.extend_from_slice(cgra.imem.rcs[row].as_slice());
    }
    write_array(dst, "dsip_rcs_imem_bitstream", "4*DSIP_IMEM_SIZE", &rcs_words)?;

    writeln!(dst, "#endif // _DSIP_BITSTREAM_H_").map_err(IoError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_contains_all_five_arrays() {
        let cgra = Cgra::new();
        let mut buf = Vec::new();
        write_bitstream_header(&mut buf, &cgra).unwrap();
        let text = String::from_utf8(buf).unwrap();
        for name in [
            "dsip_kmem_bitstream",
            "dsip_lcu_imem_bitstream",
            "dsip_lsu_imem_bitstream",
            "dsip_mxcu_imem_bitstream",
            "dsip_rcs_imem_bitstream",
        ] {
            assert!(text.contains(name), "missing {}", name);
        }
        assert!(text.starts_with("#ifndef _DSIP_BITSTREAM_H_"));
        assert!(text.trim_end().ends_with("#endif // _DSIP_BITSTREAM_H_"));
    }
}
