//! String table resolution. A string table section is a concatenation
//! of NUL-terminated byte runs indexed by byte offset; the same lookup
//! serves section names, symbol names and version strings.

/// Reads the NUL-terminated run starting at `index`. Out-of-range
/// indices and missing terminators degrade to what is there rather
/// than failing: a bad name index should not sink an otherwise valid
/// decode.
pub fn get_string(table: &[u8], index: u32) -> String {
    let start = index as usize;
    if start >= table.len() {
        return String::new();
    }
    let end = table[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|pos| start + pos)
        .unwrap_or(table.len());
    String::from_utf8_lossy(&table[start..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[u8] = b"\0.text\0.shstrtab\0.data\0";

    #[test]
    fn resolves_names_by_byte_offset() {
        assert_eq!(get_string(TABLE, 1), ".text");
        assert_eq!(get_string(TABLE, 7), ".shstrtab");
        assert_eq!(get_string(TABLE, 17), ".data");
    }

    #[test]
    fn index_zero_is_the_empty_name() {
        assert_eq!(get_string(TABLE, 0), "");
    }

    #[test]
    fn mid_run_index_yields_a_suffix() {
        assert_eq!(get_string(TABLE, 3), "ext");
    }

    #[test]
    fn out_of_range_index_degrades_to_empty() {
        assert_eq!(get_string(TABLE, 1000), "");
    }

    #[test]
    fn unterminated_tail_reads_to_the_end() {
        assert_eq!(get_string(b"abc", 0), "abc");
    }
}
