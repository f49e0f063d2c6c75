use std::io::{self, BufRead};

/// Splits input into raw lines. Commands must decode as UTF-8 but `cat`
/// content is stored byte for byte, so nothing is decoded here.
pub struct Lines<R> {
    input: R,
}

impl<R: BufRead> Lines<R> {
    pub const fn new(input: R) -> Self {
        Self { input }
    }

    /// Next line without its "\n" or "\r\n", or `None` at end of input. A
    /// final line without a terminator is still returned.
    pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.input.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}
