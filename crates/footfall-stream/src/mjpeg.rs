//! Incremental JPEG extraction from `multipart/x-mixed-replace` bodies.
//!
//! Part headers and boundaries are skipped; frames are delimited by the
//! JPEG start (`FF D8`) and end (`FF D9`) markers.

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on buffered bytes without a complete frame.
pub const MAX_BUFFERED_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct MjpegParser {
    buffer: Vec<u8>,
}

impl MjpegParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw body bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > MAX_BUFFERED_BYTES {
            // Keep only from the most recent frame start, or drop everything
            match rfind(&self.buffer, &SOI) {
                Some(start) if start > 0 => {
                    self.buffer.drain(..start);
                }
                _ => self.buffer.clear(),
            }
        }
    }

    /// Pop the oldest complete JPEG, if any.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let start = find(&self.buffer, &SOI, 0)?;
        let end = find(&self.buffer, &EOI, start + SOI.len())? + EOI.len();
        let frame = self.buffer[start..end].to_vec();
        self.buffer.drain(..end);
        Some(frame)
    }

    /// Pop every complete JPEG and keep only the newest.
    pub fn latest_frame(&mut self) -> Option<Vec<u8>> {
        let mut latest = None;
        while let Some(frame) = self.next_frame() {
            latest = Some(frame);
        }
        latest
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

fn rfind(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(payload: u8) -> Vec<u8> {
        vec![0xFF, 0xD8, payload, payload, 0xFF, 0xD9]
    }

    fn part(payload: u8) -> Vec<u8> {
        let mut out = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        out.extend(jpeg(payload));
        out.extend_from_slice(b"\r\n");
        out
    }

    #[test]
    fn test_extracts_frames_across_chunks() {
        let mut body = part(1);
        body.extend(part(2));

        let mut parser = MjpegParser::new();
        let (a, b) = body.split_at(40);
        parser.push(a);
        assert!(parser.next_frame().is_none());
        parser.push(b);

        assert_eq!(parser.next_frame(), Some(jpeg(1)));
        assert_eq!(parser.next_frame(), Some(jpeg(2)));
        assert_eq!(parser.next_frame(), None);
    }

    #[test]
    fn test_latest_frame_skips_backlog() {
        let mut parser = MjpegParser::new();
        for i in 1..=3 {
            parser.push(&part(i));
        }
        assert_eq!(parser.latest_frame(), Some(jpeg(3)));
        assert_eq!(parser.latest_frame(), None);
    }

    #[test]
    fn test_garbage_without_frame_is_bounded() {
        let mut parser = MjpegParser::new();
        parser.push(&vec![0u8; MAX_BUFFERED_BYTES + 1]);
        assert_eq!(parser.buffered(), 0);
    }
}
