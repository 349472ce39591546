use std::io::Write;

/// The process environment a command runs in.
///
/// Summaries go to `output`, diagnostics to `error`. Tests substitute
/// in-memory buffers and record the exit code instead of exiting.
pub trait Host: Send + Sync {
    /// Stream for summary lines.
    fn output(&mut self) -> impl Write;

    /// Stream for diagnostics.
    fn error(&mut self) -> impl Write;

    /// Whether the diagnostic stream is an interactive terminal, which enables the progress bar's colours.
    fn error_is_terminal(&self) -> bool;

    /// End the process with `code`.
    fn exit(&mut self, code: i32);
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct TestHost {
    pub output_buf: Vec<u8>,
    pub error_buf: Vec<u8>,
    pub exit_code: Option<i32>,
}

#[cfg(test)]
impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    pub fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

#[cfg(test)]
impl Host for TestHost {
    fn output(&mut self) -> impl Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl Write {
        &mut self.error_buf
    }

    fn error_is_terminal(&self) -> bool {
        false
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}
