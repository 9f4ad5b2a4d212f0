//! ProXR frame codec
//!
//! Every frame on the wire is `[0xAA, len(body), ...body, checksum]` where
//! the checksum is the low byte of the sum of everything before it. A
//! command body is `[0xFE, verb base + relay index, bank]`; a response body
//! carries the status payload, whose last byte is the relay state (reads)
//! or an acknowledgement code (commands).

use attrlink::{LinkError, Result};

/// First byte of every frame
pub const FRAME_HEADER: u8 = 0xAA;

/// First body byte of every command frame
pub const COMMAND_MARKER: u8 = 0xFE;

/// Responses are always header + length + one status byte + checksum
pub const RESPONSE_LEN: usize = 4;

/// Command verbs and their base hex codes.
///
/// The command code for relay N is `base + N`, so each verb owns a small
/// range of code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayVerb {
    Read,
    TurnOn,
    TurnOff,
}

impl RelayVerb {
    pub fn base_code(self) -> u8 {
        match self {
            RelayVerb::Read => 0x73,
            RelayVerb::TurnOn => 0x6B,
            RelayVerb::TurnOff => 0x63,
        }
    }

    /// Verb for a boolean write command
    pub fn for_write(on: bool) -> Self {
        if on {
            RelayVerb::TurnOn
        } else {
            RelayVerb::TurnOff
        }
    }
}

/// Low byte of the sum of `bytes`
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Wrap a body into a full frame: header, length, body, checksum.
pub fn marshal(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(body.len() + 3);
    frame.push(FRAME_HEADER);
    frame.push(body.len() as u8);
    frame.extend_from_slice(body);
    frame.push(checksum(&frame));
    frame
}

/// Validate a frame and return its body.
///
/// Header byte, length field and trailing checksum are all checked; any
/// mismatch is a framing error, fatal to the poll cycle that received it.
pub fn unmarshal(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < 4 {
        return Err(LinkError::framing(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }
    if frame[0] != FRAME_HEADER {
        return Err(LinkError::framing(format!(
            "bad header byte {:#04x}",
            frame[0]
        )));
    }
    if frame[1] as usize != frame.len() - 3 {
        return Err(LinkError::framing(format!(
            "length field {} does not match {}-byte frame",
            frame[1],
            frame.len()
        )));
    }
    let expected = checksum(&frame[..frame.len() - 1]);
    let actual = frame[frame.len() - 1];
    if actual != expected {
        return Err(LinkError::framing(format!(
            "checksum mismatch: frame carries {actual:#04x}, computed {expected:#04x}"
        )));
    }
    Ok(&frame[2..frame.len() - 1])
}

/// Build a complete command frame for one relay.
pub fn command_frame(verb: RelayVerb, relay: u8, bank: u8) -> Vec<u8> {
    marshal(&[COMMAND_MARKER, verb.base_code() + relay, bank])
}

/// Validate a READ response and extract the relay state.
///
/// The state is the last body byte (second-to-last of the frame); any
/// nonzero value means the relay is energized.
pub fn read_relay_state(frame: &[u8]) -> Result<bool> {
    let body = unmarshal(frame)?;
    match body.last() {
        Some(&state) => Ok(state != 0),
        None => Err(LinkError::framing("response has an empty body")),
    }
}

/// Relay index embedded in an attribute name ("R5" -> 5).
///
/// A name without a numeric suffix is a configuration error, caught when
/// the registry is built rather than at poll time.
pub fn relay_index(name: &str) -> Result<u8> {
    let digits_start = name.len()
        - name
            .bytes()
            .rev()
            .take_while(|b| b.is_ascii_digit())
            .count();
    let digits = &name[digits_start..];
    if digits.is_empty() {
        return Err(LinkError::config(format!(
            "relay attribute {name:?} has no numeric suffix"
        )));
    }
    digits.parse().map_err(|_| {
        LinkError::config(format!("relay index in {name:?} is out of range"))
    })
}
