//! DFPlayer Mini serial protocol definitions
//!
//! Every exchange with the module is a fixed 10 byte frame:
//! ```text
//! 0x7E  0xFF  0x06  CMD  0x00  PAR_H  PAR_L  SUM_H  SUM_L  0xEF
//! start ver   len        feedback                          end
//! ```
//! The checksum is the 16 bit two's complement of the sum of bytes 1..=6.

pub const FRAME_START: u8 = 0x7E;
pub const FRAME_VERSION: u8 = 0xFF;
/// Number of bytes between the start byte and the checksum (version..=param low)
pub const FRAME_LENGTH: u8 = 0x06;
/// Acknowledgement is never requested
pub const FRAME_NO_FEEDBACK: u8 = 0x00;
pub const FRAME_END: u8 = 0xEF;

pub const FRAME_SIZE: usize = 10;

const IDX_COMMAND: usize = 3;
const IDX_FEEDBACK: usize = 4;
const IDX_PARAM_H: usize = 5;
const IDX_PARAM_L: usize = 6;
const IDX_SUM_H: usize = 7;
const IDX_SUM_L: usize = 8;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Command {
    /// Play the next track
    Next = 0x01,

    /// Play the previous track
    Previous = 0x02,

    /// Play a track by index (1-3000), split across both parameter bytes
    TrackSelect = 0x03,

    VolumeUp = 0x04,
    VolumeDown = 0x05,

    /// Set the absolute volume (0-30)
    VolumeSelect = 0x06,

    /// Select the equalizer preset (0-5)
    SetEq = 0x07,

    /// Select the playback mode (0-3)
    PlaybackMode = 0x08,

    /// Select the playback source device (0-4)
    DeviceSelect = 0x09,

    /// Enter low power standby
    Sleep = 0x0A,

    /// Leave standby
    Normal = 0x0B,

    /// Reset the module
    Reset = 0x0C,

    Play = 0x0D,
    Pause = 0x0E,

    /// Play a track within a numbered folder (folder in high byte, track in low byte)
    FolderSelect = 0x0F,

    /// Enable amplification and set gain
    VolumeAdjust = 0x10,

    /// Repeat all tracks
    RepeatPlay = 0x11,

    /// Play a track from the `MP3` folder
    SelectTrack = 0x12,

    Stop = 0x16,

    /// Ask the module to resend its last frame
    Retransmit = 0x40,

    /// Acknowledgement frame
    Reply = 0x41,

    /// Query the current module status
    GetStatus = 0x42,

    GetVolume = 0x43,
    GetEq = 0x44,
    GetMode = 0x45,
    GetVersion = 0x46,

    /// Query the number of files on the TF card
    GetTrackCount = 0x48,

    /// Query the index of the current TF card track
    GetCurrentTrack = 0x4C,
}

impl From<Command> for u8 {
    fn from(c: Command) -> u8 {
        c as u8
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Equalizer {
    Normal = 0x00,
    Pop = 0x01,
    Rock = 0x02,
    Jazz = 0x03,
    Classic = 0x04,
    Bass = 0x05,
}

impl From<Equalizer> for u8 {
    fn from(e: Equalizer) -> u8 {
        e as u8
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlaybackMode {
    Repeat = 0x00,
    FolderRepeat = 0x01,
    SingleRepeat = 0x02,
    Random = 0x03,
}

impl From<PlaybackMode> for u8 {
    fn from(m: PlaybackMode) -> u8 {
        m as u8
    }
}

/// Playback source
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Device {
    UDisk = 0x00,
    /// Micro SD card
    Tf = 0x01,
    Aux = 0x02,
    Sleep = 0x03,
    Flash = 0x04,
}

impl From<Device> for u8 {
    fn from(d: Device) -> u8 {
        d as u8
    }
}

/// Compute the frame checksum over the version, length, command, feedback
/// and parameter bytes
pub fn checksum(bytes: &[u8]) -> u16 {
    let sum = bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));

    0u16.wrapping_sub(sum)
}

/// A single 10 byte protocol frame, used for both commands and responses
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Frame([u8; FRAME_SIZE]);

impl Frame {
    /// Build a checksummed command frame
    pub fn command(command: u8, par1: u8, par2: u8) -> Self {
        let mut b = [
            FRAME_START,
            FRAME_VERSION,
            FRAME_LENGTH,
            command,
            FRAME_NO_FEEDBACK,
            par1,
            par2,
            0x00,
            0x00,
            FRAME_END,
        ];

        let sum = checksum(&b[1..IDX_SUM_H]);
        b[IDX_SUM_H] = (sum >> 8) as u8;
        b[IDX_SUM_L] = (sum & 0xFF) as u8;

        Self(b)
    }

    /// Wrap a frame read from the module
    pub fn from_bytes(bytes: [u8; FRAME_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    pub fn command_code(&self) -> u8 {
        self.0[IDX_COMMAND]
    }

    pub fn feedback(&self) -> u8 {
        self.0[IDX_FEEDBACK]
    }

    /// 16 bit big-endian payload
    pub fn param(&self) -> u16 {
        (self.0[IDX_PARAM_H] as u16) << 8 | self.0[IDX_PARAM_L] as u16
    }

    /// Single byte payload, as used by volume and EQ replies
    pub fn param_low(&self) -> u8 {
        self.0[IDX_PARAM_L]
    }

    /// Checksum carried in the frame
    pub fn checksum(&self) -> u16 {
        (self.0[IDX_SUM_H] as u16) << 8 | self.0[IDX_SUM_L] as u16
    }

    /// Checksum derived from the frame contents
    pub fn expected_checksum(&self) -> u16 {
        checksum(&self.0[1..IDX_SUM_H])
    }

    /// Check framing bytes and checksum
    pub fn is_valid(&self) -> bool {
        self.0[0] == FRAME_START
            && self.0[1] == FRAME_VERSION
            && self.0[2] == FRAME_LENGTH
            && self.0[FRAME_SIZE - 1] == FRAME_END
            && self.checksum() == self.expected_checksum()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
