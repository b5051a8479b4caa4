//! Splits a chunked byte stream into complete text lines.

/// Accumulates body chunks and yields batches of complete lines.
///
/// A partial trailing line is carried across chunks (including an
/// incomplete multi-byte character at a chunk boundary) and only converted
/// to text once its separator arrives. [`LineSplitter::finish`] flushes a
/// non-empty tail at end of stream.
///
/// Joining every emitted line with the separator reproduces the input byte
/// stream, up to the final separator.
pub(crate) struct LineSplitter {
    separator: u8,
    fragment: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::with_separator(b'\n')
    }

    pub fn with_separator(separator: u8) -> Self {
        Self { separator, fragment: Vec::new() }
    }

    /// Appends a chunk and returns the batch of lines it completed.
    ///
    /// # Errors
    ///
    /// Fails when a completed line is not valid UTF-8.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, std::string::FromUtf8Error> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(at) = rest.iter().position(|&b| b == self.separator) {
            let mut line = std::mem::take(&mut self.fragment);
            line.extend_from_slice(&rest[..at]);
            lines.push(String::from_utf8(line)?);
            rest = &rest[at + 1..];
        }
        self.fragment.extend_from_slice(rest);
        Ok(lines)
    }

    /// Flushes the trailing line, if any.
    ///
    /// # Errors
    ///
    /// Fails when the tail is not valid UTF-8.
    pub fn finish(&mut self) -> Result<Option<String>, std::string::FromUtf8Error> {
        if self.fragment.is_empty() {
            return Ok(None);
        }
        String::from_utf8(std::mem::take(&mut self.fragment)).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"one\ntwo\n").unwrap();
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(splitter.finish().unwrap(), None);
    }

    #[test]
    fn carries_fragment_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"hel").unwrap(), Vec::<String>::new());
        assert_eq!(splitter.push(b"lo\nwor").unwrap(), vec!["hello"]);
        assert_eq!(splitter.push(b"ld").unwrap(), Vec::<String>::new());
        assert_eq!(splitter.finish().unwrap(), Some("world".to_owned()));
    }

    #[test]
    fn carries_split_multibyte_character() {
        let text = "héllo\n".as_bytes();
        let mut splitter = LineSplitter::new();
        // split in the middle of the two-byte é
        assert_eq!(splitter.push(&text[..2]).unwrap(), Vec::<String>::new());
        assert_eq!(splitter.push(&text[2..]).unwrap(), vec!["héllo"]);
    }

    #[test]
    fn preserves_empty_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"a\n\nb\n").unwrap();
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn any_chunking_reproduces_the_lines() {
        let text = b"alpha\nbeta\ngamma\ndelta\n";
        for split_at in 0..text.len() {
            let mut splitter = LineSplitter::new();
            let mut lines = splitter.push(&text[..split_at]).unwrap();
            lines.extend(splitter.push(&text[split_at..]).unwrap());
            assert_eq!(lines, vec!["alpha", "beta", "gamma", "delta"], "split at {split_at}");
            assert_eq!(splitter.finish().unwrap(), None);
        }
    }

    #[test]
    fn custom_separator() {
        let mut splitter = LineSplitter::with_separator(b';');
        assert_eq!(splitter.push(b"a;b;c").unwrap(), vec!["a", "b"]);
        assert_eq!(splitter.finish().unwrap(), Some("c".to_owned()));
    }

    #[test]
    fn invalid_utf8_line_fails() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(&[0xff, 0xfe, b'\n']).is_err());
    }
}
