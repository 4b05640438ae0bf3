//! Incremental decoding of raw channel bytes into input events

use partyline_core::InputEvent;

/// End-of-text, what a raw-mode terminal sends for ctrl-c.
const ETX: u8 = 0x03;
/// End-of-transmission, what a raw-mode terminal sends for ctrl-d.
const EOT: u8 = 0x04;

/// Accumulates raw bytes from the transport and yields complete events.
///
/// Lines end at `\n`, `\r\n`, or a bare `\r`; ETX becomes `Break` and EOT
/// becomes `EndOfInput` wherever they appear, discarding any partial line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Last byte seen was `\r`; swallow an immediately following `\n`.
    pending_lf: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) -> Vec<InputEvent> {
        let mut events = Vec::new();
        for &byte in data {
            if self.pending_lf {
                self.pending_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => events.push(self.take_line()),
                b'\r' => {
                    self.pending_lf = true;
                    events.push(self.take_line());
                }
                ETX => {
                    self.buf.clear();
                    events.push(InputEvent::Break);
                }
                EOT => {
                    self.buf.clear();
                    events.push(InputEvent::EndOfInput);
                }
                _ => self.buf.push(byte),
            }
        }
        events
    }

    fn take_line(&mut self) -> InputEvent {
        let bytes = std::mem::take(&mut self.buf);
        InputEvent::Line(String::from_utf8_lossy(&bytes).into_owned())
    }
}
