use std::convert::TryInto;
use std::io;

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, BytesMut, IntoBuf};
use protobuf::{CodedOutputStream, Message};
use tokio_codec::{Decoder, Encoder};

use crate::proto;

/// Cast wire protocol is a 4-byte big-endian length prefix followed by a
/// serialized `CastMessage` protobuf.
const FRAME_HEADER_LENGTH: usize = 4;

/// Phase of decoding a single frame. Tracked explicitly so the decoder never
/// drops bytes out of the `BytesMut` across `poll` calls that each see only
/// a partial frame.
#[derive(Debug)]
enum DecodeState {
    /// Waiting to read a u32 giving the length of the next protobuf.
    Header,
    /// Reading a protobuf of the given length.
    Payload(usize),
}

impl Default for DecodeState {
    fn default() -> Self {
        DecodeState::Header
    }
}

/// Length-prefixed protobuf framing for `proto::CastMessage`. One instance
/// is threaded through `tokio_codec::Framed` and keeps both encode and
/// decode state, matching the teacher's `codec::CastMessage`.
#[derive(Debug)]
pub struct FrameCodec {
    state: DecodeState,
    max_frame_size: usize,
    decoded_frames: u64,
    encoded_frames: u64,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        FrameCodec {
            state: DecodeState::Header,
            max_frame_size,
            decoded_frames: 0,
            encoded_frames: 0,
        }
    }

    fn decode_header(&mut self, src: &mut BytesMut) -> io::Result<Option<usize>> {
        if src.len() < FRAME_HEADER_LENGTH {
            return Ok(None);
        }
        let header = src.split_to(FRAME_HEADER_LENGTH);
        let length = {
            let mut header = header.into_buf();
            header.get_u32_be() as usize
        };
        if length == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "zero-length cast frame",
            ));
        }
        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "cast frame of length {} exceeds max frame size {}",
                    length, self.max_frame_size
                ),
            ));
        }
        src.reserve(length);
        Ok(Some(length))
    }

    fn decode_payload(&self, n: usize, src: &mut BytesMut) -> Option<BytesMut> {
        if src.len() < n {
            return None;
        }
        Some(src.split_to(n))
    }

    /// Decode one frame. The outer `io::Result` covers framing-level
    /// failures (bad length prefix) that desync the byte stream and must
    /// kill the channel; the inner `Result` covers a payload that parsed as
    /// a well-framed chunk of bytes but not as a valid protobuf message,
    /// which leaves framing intact and is recoverable by skipping it
    /// (spec.md §4.3: "If decoding fails, log and continue"; §7: parse
    /// failures on inbound envelopes are logged and dropped, not fatal).
    fn try_decode(
        &mut self,
        src: &mut BytesMut,
    ) -> io::Result<Option<Result<proto::CastMessage, protobuf::ProtobufError>>> {
        let n = match self.state {
            DecodeState::Header => match self.decode_header(src)? {
                Some(n) => n,
                None => return Ok(None),
            },
            DecodeState::Payload(n) => n,
        };
        self.state = DecodeState::Payload(n);
        if let Some(mut src) = self.decode_payload(n, src) {
            self.state = DecodeState::Header;
            src.reserve(FRAME_HEADER_LENGTH);
            match protobuf::parse_from_bytes::<proto::CastMessage>(&src) {
                Ok(message) => {
                    self.decoded_frames += 1;
                    trace!(
                        "codec decoded frame {} for message in namespace {}",
                        self.decoded_frames,
                        message.get_namespace()
                    );
                    Ok(Some(Ok(message)))
                }
                Err(err) => Ok(Some(Err(err))),
            }
        } else {
            Ok(None)
        }
    }
}

impl Decoder for FrameCodec {
    type Item = proto::CastMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.try_decode(src) {
                Ok(Some(Ok(message))) => return Ok(Some(message)),
                Ok(Some(Err(err))) => {
                    warn!("dropping frame with malformed payload: {:?}", err);
                    continue;
                }
                Ok(None) => return Ok(None),
                Err(err) => {
                    warn!("error decoding frame: {:?}", err);
                    return Err(err);
                }
            }
        }
    }
}

impl Encoder for FrameCodec {
    type Item = proto::CastMessage;
    type Error = io::Error;

    fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encoded_frames += 1;
        trace!(
            "codec encoding frame {} for namespace {}",
            self.encoded_frames,
            item.get_namespace()
        );

        let mut buf = Vec::new();
        let mut output = CodedOutputStream::new(&mut buf);
        item.write_to(&mut output)
            .and_then(|_| output.flush())
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        if buf.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "encoded cast frame of length {} exceeds max frame size {}",
                    buf.len(),
                    self.max_frame_size
                ),
            ));
        }

        let header = &mut [0; FRAME_HEADER_LENGTH];
        let msg_size: u32 = buf
            .len()
            .try_into()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        BigEndian::write_u32(header, msg_size);

        dst.reserve(FRAME_HEADER_LENGTH + buf.len());
        dst.put_slice(header);
        dst.put_slice(&buf);
        Ok(())
    }
}
