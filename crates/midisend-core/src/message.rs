//! RT-safe MIDI wire messages and the channel-voice encoder.
//!
//! A [`MidiMessage`] is at most three bytes and lives inline, so it can be
//! copied through the event queue and into a server buffer without touching
//! the heap.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Longest message the client forwards (status byte + two data bytes).
pub const MAX_MESSAGE_LEN: usize = 3;

pub const DEFAULT_NOTE_ON_VELOCITY: u8 = 64;
pub const DEFAULT_NOTE_OFF_VELOCITY: u8 = 0;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;
const PITCH_BEND: u8 = 0xE0;

const DATA_MAX: u8 = 0x7F;
const CHANNEL_MAX: u8 = 0x0F;

/// A single MIDI 1.0 wire event: one status byte followed by up to two data bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    data: [u8; MAX_MESSAGE_LEN],
    /// Valid bytes in `data` (1-3).
    len: u8,
}

impl MidiMessage {
    /// Validates length (1-3) and that the first byte is a status byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > MAX_MESSAGE_LEN {
            return Err(Error::InvalidLength(bytes.len()));
        }
        if bytes[0] & 0x80 == 0 {
            return Err(Error::MissingStatus(bytes[0]));
        }
        let mut data = [0u8; MAX_MESSAGE_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            data,
            len: bytes.len() as u8,
        })
    }

    /// `[0x90 | channel, pitch, velocity]`
    pub fn note_on(pitch: u8, velocity: u8, channel: u8) -> Result<Self> {
        Self::channel_voice(NOTE_ON, channel, ("pitch", pitch), ("velocity", velocity))
    }

    /// `[0x80 | channel, pitch, velocity]`
    pub fn note_off(pitch: u8, velocity: u8, channel: u8) -> Result<Self> {
        Self::channel_voice(NOTE_OFF, channel, ("pitch", pitch), ("velocity", velocity))
    }

    /// Note On starting from velocity 64 on channel 0.
    #[inline]
    pub fn note_on_builder(pitch: u8) -> NoteBuilder {
        NoteBuilder {
            status: NOTE_ON,
            pitch,
            velocity: DEFAULT_NOTE_ON_VELOCITY,
            channel: 0,
        }
    }

    /// Note Off starting from velocity 0 on channel 0.
    #[inline]
    pub fn note_off_builder(pitch: u8) -> NoteBuilder {
        NoteBuilder {
            status: NOTE_OFF,
            pitch,
            velocity: DEFAULT_NOTE_OFF_VELOCITY,
            channel: 0,
        }
    }

    /// `[0xB0 | channel, controller, value]`
    pub fn control_change(controller: u8, value: u8, channel: u8) -> Result<Self> {
        Self::channel_voice(
            CONTROL_CHANGE,
            channel,
            ("controller", controller),
            ("value", value),
        )
    }

    /// `[0xC0 | channel, program]`, two bytes.
    pub fn program_change(program: u8, channel: u8) -> Result<Self> {
        let status = PROGRAM_CHANGE | check_channel(channel)?;
        let program = check_data("program", program)?;
        Ok(Self {
            data: [status, program, 0],
            len: 2,
        })
    }

    /// `value`: signed 14-bit (-8192 to 8191), 0 is center.
    pub fn pitch_bend(value: i16, channel: u8) -> Result<Self> {
        if !(-8192..=8191).contains(&value) {
            return Err(Error::OutOfRange {
                name: "pitch bend",
                value: value as i32,
                min: -8192,
                max: 8191,
            });
        }
        let status = PITCH_BEND | check_channel(channel)?;
        let unsigned = (value as i32 + 8192) as u16;
        Ok(Self {
            data: [status, (unsigned & 0x7F) as u8, ((unsigned >> 7) & 0x7F) as u8],
            len: 3,
        })
    }

    fn channel_voice(
        status: u8,
        channel: u8,
        first: (&'static str, u8),
        second: (&'static str, u8),
    ) -> Result<Self> {
        let status = status | check_channel(channel)?;
        let first = check_data(first.0, first.1)?;
        let second = check_data(second.0, second.1)?;
        Ok(Self {
            data: [status, first, second],
            len: 3,
        })
    }

    /// The valid bytes, status first.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Always 1-3; a message is never empty.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// High nibble of the status byte, e.g. `0x90` for Note On.
    #[inline]
    pub fn status(&self) -> u8 {
        self.data[0] & 0xF0
    }

    /// Low nibble of the status byte. Only meaningful for channel messages.
    #[inline]
    pub fn channel(&self) -> u8 {
        self.data[0] & 0x0F
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.status() == NOTE_ON && self.len == 3 && self.data[2] > 0
    }

    /// Note Off, or Note On with velocity 0.
    #[inline]
    pub fn is_note_off(&self) -> bool {
        self.len == 3
            && (self.status() == NOTE_OFF || (self.status() == NOTE_ON && self.data[2] == 0))
    }

    /// Pitch of a Note On/Off.
    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.status() {
            NOTE_ON | NOTE_OFF if self.len == 3 => Some(self.data[1]),
            _ => None,
        }
    }
}

#[inline]
fn check_data(name: &'static str, value: u8) -> Result<u8> {
    if value > DATA_MAX {
        return Err(Error::OutOfRange {
            name,
            value: value as i32,
            min: 0,
            max: DATA_MAX as i32,
        });
    }
    Ok(value)
}

#[inline]
fn check_channel(channel: u8) -> Result<u8> {
    if channel > CHANNEL_MAX {
        return Err(Error::OutOfRange {
            name: "channel",
            value: channel as i32,
            min: 0,
            max: CHANNEL_MAX as i32,
        });
    }
    Ok(channel)
}

/// Note On/Off with defaulted velocity and channel, validated on `build()`.
#[derive(Clone, Copy, Debug)]
pub struct NoteBuilder {
    status: u8,
    pitch: u8,
    velocity: u8,
    channel: u8,
}

impl NoteBuilder {
    #[inline]
    pub fn velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    #[inline]
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Fails if pitch, velocity or channel is out of range.
    pub fn build(self) -> Result<MidiMessage> {
        MidiMessage::channel_voice(
            self.status,
            self.channel,
            ("pitch", self.pitch),
            ("velocity", self.velocity),
        )
    }
}

impl AsRef<[u8]> for MidiMessage {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl TryFrom<&[u8]> for MidiMessage {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}

/// `[144, 60, 100]`
impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", byte)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MidiMessage")
            .field(&format_args!("{:02X?}", self.as_bytes()))
            .finish()
    }
}

impl Serialize for MidiMessage {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.as_bytes())
    }
}

impl<'de> Deserialize<'de> for MidiMessage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        MidiMessage::from_bytes(&bytes).map_err(de::Error::custom)
    }
}
