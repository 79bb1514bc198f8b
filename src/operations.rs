//! Logical player operations
//!
//! Each operation is described as data: the command it sends, how its
//! arguments are packed into the two parameter bytes, and what happens to
//! out of range arguments.

use crate::protocol::Command;

/// Upper bound applied to an argument
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Limit {
    /// Values above the bound are replaced by the bound
    Clamp(u16),
    /// Values above the bound cancel the operation
    Reject(u16),
}

impl Limit {
    pub fn apply(&self, value: u16) -> Option<u16> {
        match *self {
            Limit::Clamp(max) => Some(value.min(max)),
            Limit::Reject(max) if value > max => None,
            Limit::Reject(_) => Some(value),
        }
    }
}

/// Parameter byte encoding
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Params {
    /// Both parameter bytes zero
    None,
    /// First argument in the low byte, high byte zero
    Low(Limit),
    /// First argument split big-endian across both bytes
    Word(Limit),
    /// First argument in the high byte, second in the low byte
    Pair(Limit, Limit),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub command: Command,
    pub params: Params,
}

impl Operation {
    /// Pack arguments into `(par1, par2)`, or `None` when the bounds policy
    /// rejects them
    pub fn encode(&self, a: u16, b: u16) -> Option<(u8, u8)> {
        match self.params {
            Params::None => Some((0, 0)),
            Params::Low(l) => l.apply(a).map(|v| (0, v as u8)),
            Params::Word(l) => l.apply(a).map(|v| ((v >> 8) as u8, (v & 0xFF) as u8)),
            Params::Pair(la, lb) => match (la.apply(a), lb.apply(b)) {
                (Some(a), Some(b)) => Some((a as u8, b as u8)),
                _ => None,
            },
        }
    }
}

const fn simple(name: &'static str, command: Command) -> Operation {
    Operation { name, command, params: Params::None }
}

pub const PLAY: Operation = simple("play", Command::Play);
pub const PAUSE: Operation = simple("pause", Command::Pause);
pub const STOP: Operation = simple("stop", Command::Stop);
pub const NEXT: Operation = simple("next", Command::Next);
pub const PREVIOUS: Operation = simple("previous", Command::Previous);
pub const VOLUME_UP: Operation = simple("volume up", Command::VolumeUp);
pub const VOLUME_DOWN: Operation = simple("volume down", Command::VolumeDown);
pub const SLEEP: Operation = simple("sleep", Command::Sleep);
pub const WAKE: Operation = simple("wake", Command::Normal);
pub const RESET: Operation = simple("reset", Command::Reset);

pub const SET_VOLUME: Operation = Operation {
    name: "set volume",
    command: Command::VolumeSelect,
    params: Params::Low(Limit::Clamp(30)),
};

pub const PLAY_TRACK: Operation = Operation {
    name: "play track",
    command: Command::TrackSelect,
    params: Params::Word(Limit::Reject(3000)),
};

pub const PLAY_FOLDER_TRACK: Operation = Operation {
    name: "play folder and track",
    command: Command::FolderSelect,
    params: Params::Pair(Limit::Reject(100), Limit::Reject(255)),
};

pub const SET_EQUALIZER: Operation = Operation {
    name: "set equalizer",
    command: Command::SetEq,
    params: Params::Low(Limit::Reject(5)),
};

pub const SET_PLAYBACK_MODE: Operation = Operation {
    name: "set playback mode",
    command: Command::PlaybackMode,
    params: Params::Low(Limit::Reject(3)),
};

pub const SET_DEVICE: Operation = Operation {
    name: "set device",
    command: Command::DeviceSelect,
    params: Params::Low(Limit::Reject(4)),
};
