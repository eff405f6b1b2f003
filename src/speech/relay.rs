//! Client for the Bouyomi-chan speech relay.
//!
//! Each utterance is one little-endian frame written to a fresh TCP
//! connection, which is closed right after:
//!
//! | field    | type | value                          |
//! |----------|------|--------------------------------|
//! | command  | i16  | 1 (speak message)              |
//! | speed    | i16  | -1 (relay's own UI setting)    |
//! | tone     | i16  | -1                             |
//! | volume   | i16  | -1                             |
//! | voice    | i16  | 0 (relay's own UI setting)     |
//! | charCode | u8   | 0 (UTF-8)                      |
//! | length   | i32  | byte length of the message     |
//! | message  | [u8] | UTF-8 text                     |

use byteorder::{ByteOrder, LittleEndian};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use super::SpeechError;

pub const DEFAULT_RELAY_HOST: &str = "127.0.0.1";
pub const DEFAULT_RELAY_PORT: u16 = 50001;

pub const COMMAND_SPEAK: i16 = 1;
/// Tells the relay to use whatever is set in its own window.
pub const RELAY_SETTING: i16 = -1;
pub const RELAY_VOICE: i16 = 0;
pub const CHAR_CODE_UTF8: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    pub command: i16,
    pub speed: i16,
    pub tone: i16,
    pub volume: i16,
    pub voice: i16,
    pub char_code: u8,
    pub message: Vec<u8>,
}

impl RelayFrame {
    pub const HEADER_LEN: usize = 15;

    /// A "speak this message" frame leaving every voice setting to the relay.
    pub fn speak(sentence: &str) -> Self {
        Self {
            command: COMMAND_SPEAK,
            speed: RELAY_SETTING,
            tone: RELAY_SETTING,
            volume: RELAY_SETTING,
            voice: RELAY_VOICE,
            char_code: CHAR_CODE_UTF8,
            message: sentence.as_bytes().to_vec(),
        }
    }

    /// Serialize the frame. Fails if the message doesn't fit the `i32`
    /// length field.
    pub fn encode(&self) -> Result<Vec<u8>, SpeechError> {
        let length = length_field(self.message.len())?;
        let mut buf = vec![0u8; Self::HEADER_LEN + self.message.len()];
        LittleEndian::write_i16(&mut buf[0..2], self.command);
        LittleEndian::write_i16(&mut buf[2..4], self.speed);
        LittleEndian::write_i16(&mut buf[4..6], self.tone);
        LittleEndian::write_i16(&mut buf[6..8], self.volume);
        LittleEndian::write_i16(&mut buf[8..10], self.voice);
        buf[10] = self.char_code;
        LittleEndian::write_i32(&mut buf[11..15], length);
        buf[Self::HEADER_LEN..].copy_from_slice(&self.message);
        Ok(buf)
    }

    /// Parse a complete frame. Returns `None` if `bytes` is truncated or the
    /// length field disagrees with the payload.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::HEADER_LEN {
            return None;
        }
        let length = usize::try_from(LittleEndian::read_i32(&bytes[11..15])).ok()?;
        let message = &bytes[Self::HEADER_LEN..];
        if message.len() != length {
            return None;
        }
        Some(Self {
            command: LittleEndian::read_i16(&bytes[0..2]),
            speed: LittleEndian::read_i16(&bytes[2..4]),
            tone: LittleEndian::read_i16(&bytes[4..6]),
            volume: LittleEndian::read_i16(&bytes[6..8]),
            voice: LittleEndian::read_i16(&bytes[8..10]),
            char_code: bytes[10],
            message: message.to_vec(),
        })
    }
}

fn length_field(len: usize) -> Result<i32, SpeechError> {
    i32::try_from(len).map_err(|_| SpeechError::MessageTooLong(len))
}

/// Sends utterances to the relay. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RelayClient {
    addr: String,
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_HOST, DEFAULT_RELAY_PORT)
    }
}

impl RelayClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Deliver one utterance. Uses the OS default connect timeout, so a hung
    /// relay stalls this call (and only this call) until the OS gives up.
    pub async fn send(&self, sentence: &str) -> Result<(), SpeechError> {
        let frame = RelayFrame::speak(sentence).encode()?;

        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| self.unavailable(source))?;
        stream
            .write_all(&frame)
            .await
            .map_err(|source| self.unavailable(source))?;
        stream
            .shutdown()
            .await
            .map_err(|source| self.unavailable(source))?;

        debug!("Sent {} bytes to relay at {}", frame.len(), self.addr);
        Ok(())
    }

    fn unavailable(&self, source: std::io::Error) -> SpeechError {
        SpeechError::RelayUnavailable {
            addr: self.addr.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn encodes_frame_byte_for_byte() {
        let bytes = RelayFrame::speak("hi").encode().unwrap();
        assert_eq!(
            bytes,
            vec![
                0x01, 0x00, // command
                0xff, 0xff, // speed
                0xff, 0xff, // tone
                0xff, 0xff, // volume
                0x00, 0x00, // voice
                0x00, // char code
                0x02, 0x00, 0x00, 0x00, // length
                b'h', b'i',
            ]
        );
    }

    #[test]
    fn length_counts_utf8_bytes() {
        let frame = RelayFrame::speak("あいう");
        let bytes = frame.encode().unwrap();
        assert_eq!(LittleEndian::read_i32(&bytes[11..15]), 9);
        assert_eq!(RelayFrame::decode(&bytes), Some(frame));
    }

    #[test]
    fn oversized_length_is_rejected() {
        assert_eq!(length_field(9).unwrap(), 9);
        assert_eq!(length_field(i32::MAX as usize).unwrap(), i32::MAX);
        let too_long = i32::MAX as usize + 1;
        assert!(matches!(
            length_field(too_long),
            Err(SpeechError::MessageTooLong(len)) if len == too_long
        ));
    }

    #[test]
    fn decode_rejects_truncated_frames() {
        let bytes = RelayFrame::speak("hello").encode().unwrap();
        assert!(RelayFrame::decode(&bytes[..10]).is_none());
        assert!(RelayFrame::decode(&bytes[..bytes.len() - 1]).is_none());
    }

    #[tokio::test]
    async fn sends_frame_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        RelayClient::new("127.0.0.1", port).send("hi").await.unwrap();
        let received = server.await.unwrap();
        assert_eq!(received, RelayFrame::speak("hi").encode().unwrap());
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = RelayClient::new("127.0.0.1", port).send("hi").await.unwrap_err();
        assert!(matches!(err, SpeechError::RelayUnavailable { .. }));
    }
}
