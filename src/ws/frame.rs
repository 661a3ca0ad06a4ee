/*
 * frame.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, an HTTP/1.1 client and server library.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! WebSocket frame codec (RFC 6455 §5.2): encoder with client-side masking
//! and an incremental parser for the receive path.
//!
//! Payload lengths use the 7-bit, 16-bit, or 63-bit encodings. A frame's
//! payload is kept unmasked in memory; the masking key, when present, is
//! applied on encode and removed on parse.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};

pub mod opcodes {
    pub const CONTINUATION: u8 = 0x0;
    pub const TEXT: u8 = 0x1;
    pub const BINARY: u8 = 0x2;
    pub const CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;
}

/// Largest payload the parser accepts for a data frame. Control frames are
/// limited to 125 bytes by the RFC.
pub const MAX_FRAME_PAYLOAD: usize = 1 << 20;

pub fn is_control_opcode(opcode: u8) -> bool {
    matches!(opcode, opcodes::CLOSE | opcodes::PING | opcodes::PONG)
}

/// XOR the payload with the masking key, byte `i` with `key[i % 4]`.
/// Applying it twice restores the input.
pub fn mask_transform(payload: &mut [u8], key: &[u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// One frame, payload unmasked. `masking_key` present exactly when the
/// frame is (to be) masked on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: u8,
    pub masking_key: Option<[u8; 4]>,
    pub payload: Vec<u8>,
}

impl WsFrame {
    pub fn new(opcode: u8, payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            masking_key: None,
            payload,
        }
    }

    pub fn text(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(opcodes::TEXT, payload.into())
    }

    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(opcodes::BINARY, payload.into())
    }

    pub fn ping(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(opcodes::PING, payload.into())
    }

    pub fn pong(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(opcodes::PONG, payload.into())
    }

    /// Close frame, optionally carrying a big-endian status code and a
    /// UTF-8 reason.
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let mut payload = Vec::new();
        if let Some(code) = code {
            payload.extend_from_slice(&code.to_be_bytes());
            payload.extend_from_slice(reason.as_bytes());
        }
        Self::new(opcodes::CLOSE, payload)
    }

    pub fn masked(&self) -> bool {
        self.masking_key.is_some()
    }

    pub fn set_masking_key(&mut self, key: [u8; 4]) {
        self.masking_key = Some(key);
    }

    pub fn is_control(&self) -> bool {
        is_control_opcode(self.opcode)
    }

    /// Status code of a close frame (first two payload bytes).
    pub fn close_status(&self) -> Option<u16> {
        if self.opcode != opcodes::CLOSE || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Serialize onto `out`, masking the payload when a key is set.
    pub fn encode(&self, out: &mut BytesMut) -> Result<()> {
        if self.is_control() && self.payload.len() > 125 {
            return Err(Error::data("control frame payload over 125 bytes"));
        }

        let mut b0 = self.opcode & 0x0f;
        if self.fin {
            b0 |= 0x80;
        }
        if self.rsv1 {
            b0 |= 0x40;
        }
        if self.rsv2 {
            b0 |= 0x20;
        }
        if self.rsv3 {
            b0 |= 0x10;
        }
        out.put_u8(b0);

        let mask_bit = if self.masked() { 0x80 } else { 0x00 };
        let len = self.payload.len();
        if len < 126 {
            out.put_u8(mask_bit | len as u8);
        } else if len <= 0xffff {
            out.put_u8(mask_bit | 126);
            out.put_u16(len as u16);
        } else {
            out.put_u8(mask_bit | 127);
            out.put_u64(len as u64);
        }

        match self.masking_key {
            Some(key) => {
                out.put_slice(&key);
                let mut masked = self.payload.clone();
                mask_transform(&mut masked, &key);
                out.put_slice(&masked);
            }
            None => out.put_slice(&self.payload),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Header,
    ExtendedLen2,
    ExtendedLen8,
    MaskingKey,
    Payload,
}

/// Incremental frame parser. Feed bytes via `receive`; a complete frame is
/// returned as soon as it is fully buffered.
#[derive(Debug)]
pub struct FrameParser {
    state: FrameState,
    require_unmasked: bool,
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: u8,
    masked: bool,
    masking_key: [u8; 4],
    payload_len: usize,
}

impl FrameParser {
    /// With `require_unmasked`, a masked frame is a protocol error (the
    /// client side: server-sent frames must not be masked).
    pub fn new(require_unmasked: bool) -> Self {
        Self {
            state: FrameState::Header,
            require_unmasked,
            fin: false,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: 0,
            masked: false,
            masking_key: [0; 4],
            payload_len: 0,
        }
    }

    /// Consume as much of `buf` as possible. Some(frame) when one frame is
    /// complete (leftover bytes stay in `buf`); None when more data is
    /// needed.
    pub fn receive(&mut self, buf: &mut BytesMut) -> Result<Option<WsFrame>> {
        loop {
            match self.state {
                FrameState::Header => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    let b0 = buf.get_u8();
                    let b1 = buf.get_u8();
                    self.fin = b0 & 0x80 != 0;
                    self.rsv1 = b0 & 0x40 != 0;
                    self.rsv2 = b0 & 0x20 != 0;
                    self.rsv3 = b0 & 0x10 != 0;
                    self.opcode = b0 & 0x0f;
                    self.masked = b1 & 0x80 != 0;

                    if self.masked && self.require_unmasked {
                        return Err(Error::parse("received a masked frame"));
                    }

                    let len7 = b1 & 0x7f;
                    if len7 == 126 {
                        self.state = FrameState::ExtendedLen2;
                    } else if len7 == 127 {
                        self.state = FrameState::ExtendedLen8;
                    } else {
                        self.payload_len = len7 as usize;
                        self.check_payload_len()?;
                        self.state = if self.masked {
                            FrameState::MaskingKey
                        } else {
                            FrameState::Payload
                        };
                    }
                }
                FrameState::ExtendedLen2 => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    self.payload_len = buf.get_u16() as usize;
                    self.check_payload_len()?;
                    self.state = if self.masked {
                        FrameState::MaskingKey
                    } else {
                        FrameState::Payload
                    };
                }
                FrameState::ExtendedLen8 => {
                    if buf.len() < 8 {
                        return Ok(None);
                    }
                    let len = buf.get_u64();
                    if len > MAX_FRAME_PAYLOAD as u64 {
                        return Err(Error::parse("frame payload too long"));
                    }
                    self.payload_len = len as usize;
                    self.check_payload_len()?;
                    self.state = if self.masked {
                        FrameState::MaskingKey
                    } else {
                        FrameState::Payload
                    };
                }
                FrameState::MaskingKey => {
                    if buf.len() < 4 {
                        return Ok(None);
                    }
                    buf.copy_to_slice(&mut self.masking_key);
                    self.state = FrameState::Payload;
                }
                FrameState::Payload => {
                    if buf.len() < self.payload_len {
                        return Ok(None);
                    }
                    let mut payload = buf.split_to(self.payload_len).to_vec();
                    if self.masked {
                        mask_transform(&mut payload, &self.masking_key);
                    }
                    let frame = WsFrame {
                        fin: self.fin,
                        rsv1: self.rsv1,
                        rsv2: self.rsv2,
                        rsv3: self.rsv3,
                        opcode: self.opcode,
                        masking_key: if self.masked { Some(self.masking_key) } else { None },
                        payload,
                    };
                    self.state = FrameState::Header;
                    return Ok(Some(frame));
                }
            }
        }
    }

    fn check_payload_len(&self) -> Result<()> {
        if is_control_opcode(self.opcode) && self.payload_len > 125 {
            return Err(Error::parse("control frame payload over 125 bytes"));
        }
        if self.payload_len > MAX_FRAME_PAYLOAD {
            return Err(Error::parse("frame payload too long"));
        }
        Ok(())
    }
}
