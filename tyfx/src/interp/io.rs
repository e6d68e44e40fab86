//! Console sinks and the line-oriented input handle

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

/// Output and diagnostic sinks of a run
pub struct Console {
    out: Box<dyn Write>,
    diag: Box<dyn Write>,
}

impl Console {
    /// Standard output and standard error
    pub fn stdio() -> Self {
        Console {
            out: Box::new(io::stdout()),
            diag: Box::new(io::stderr()),
        }
    }

    pub fn new(out: impl Write + 'static, diag: impl Write + 'static) -> Self {
        Console {
            out: Box::new(out),
            diag: Box::new(diag),
        }
    }

    /// Raw text to the output sink, no newline
    pub fn put(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    /// One line on the diagnostic sink
    pub fn diag_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.diag, "{line}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.diag.flush()
    }
}

/// Shared in-memory sink, readable after the run
#[derive(Debug, Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Line source consumed by ReadLine
pub struct InputLines {
    lines: Option<Lines<BufReader<Box<dyn AsyncRead + Unpin>>>>,
}

impl InputLines {
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    pub fn from_reader(reader: impl AsyncRead + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Unpin> = Box::new(reader);
        InputLines {
            lines: Some(BufReader::new(reader).lines()),
        }
    }

    /// Input that is already at its end
    pub fn empty() -> Self {
        InputLines { lines: None }
    }

    /// Next line without its terminator; `None` at end of input
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.lines.as_mut() {
            Some(lines) => lines.next_line().await,
            None => Ok(None),
        }
    }

    /// Drop the underlying reader
    pub fn close(&mut self) {
        self.lines = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_writes_to_sinks() {
        let out = Capture::new();
        let diag = Capture::new();
        let mut console = Console::new(out.clone(), diag.clone());
        console.put("a").unwrap();
        console.put("b").unwrap();
        console.diag_line("warn").unwrap();
        assert_eq!(out.contents(), "ab");
        assert_eq!(diag.lines(), vec!["warn"]);
    }

    #[tokio::test]
    async fn test_input_lines_reads_in_order() {
        let mut input = InputLines::from_reader(&b"first\nsecond\r\n"[..]);
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_input_is_at_end() {
        let mut input = InputLines::from_reader(&b"line\n"[..]);
        input.close();
        assert_eq!(input.next_line().await.unwrap(), None);
        assert_eq!(InputLines::empty().next_line().await.unwrap(), None);
    }
}
