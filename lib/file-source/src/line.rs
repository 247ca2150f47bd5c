//! A line splitter that treats `\n`, `\r`, and `\r\n` each as one terminator
//! (§4.B), generalized from the teacher's `buffer::read_until_with_max_size`
//! (same fill-buf/consume/position-tracking shape, single fixed delimiter).

/// Finds the first line terminator in `buf`.
///
/// Returns `(line_len, consumed)`: `line_len` is the number of bytes in the
/// line itself (terminator excluded), `consumed` additionally counts the
/// terminator's width (1 for `\n`/`\r`, 2 for `\r\n`).
fn find_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    for (i, &byte) in buf.iter().enumerate() {
        match byte {
            b'\n' => return Some((i, i + 1)),
            b'\r' => {
                if buf.get(i + 1) == Some(&b'\n') {
                    return Some((i, i + 2));
                }
                return Some((i, i + 1));
            }
            _ => {}
        }
    }
    None
}

/// One complete line pulled out of `buf`, plus how many bytes to drop from
/// the front of `buf` to consume it (line bytes + terminator width).
pub(crate) struct SplitLine {
    pub line: Vec<u8>,
    pub consumed: usize,
}

/// Pulls as many complete lines out of the front of `buf` as it can,
/// returning them in order. Bytes of a trailing incomplete line are left in
/// `buf` for the next read cycle.
pub(crate) fn split_lines(buf: &mut Vec<u8>) -> Vec<SplitLine> {
    let mut out = Vec::new();
    let mut start = 0;
    loop {
        match find_terminator(&buf[start..]) {
            Some((line_len, consumed)) => {
                out.push(SplitLine {
                    line: buf[start..start + line_len].to_vec(),
                    consumed,
                });
                start += consumed;
            }
            None => break,
        }
    }
    buf.drain(0..start);
    out
}
