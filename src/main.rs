#[macro_use]
extern crate log;

extern crate structopt;
use structopt::StructOpt;

extern crate simplelog;
use simplelog::{Config, LevelFilter, SimpleLogger};

use anyhow::Context;

use dfplayer_mini::{Options, Player};

#[derive(Clone, Debug, StructOpt)]
pub struct Args {
    /// Serial port to connect to
    #[structopt(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial port baud rate
    #[structopt(long, default_value = "9600")]
    baud: usize,

    #[structopt(flatten)]
    options: Options,

    /// Log level for console output
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,

    #[structopt(subcommand)]
    action: Action,
}

#[derive(Clone, Debug, StructOpt)]
pub enum Action {
    Play,
    Pause,
    Stop,
    /// Skip to the next track
    Next,
    /// Return to the previous track
    Previous,
    VolumeUp,
    VolumeDown,
    /// Set the volume (0-30)
    Volume { level: u8 },
    /// Play a track by index (0-3000)
    Track { track: u16 },
    /// Play a track from a numbered folder
    Folder { folder: u8, track: u16 },
    /// Select the equalizer (0 normal, 1 pop, 2 rock, 3 jazz, 4 classic, 5 bass)
    Eq { option: u8 },
    /// Select the playback mode (0 repeat, 1 folder repeat, 2 single repeat, 3 random)
    Mode { option: u8 },
    /// Select the source device (0 U-disk, 1 TF, 2 aux, 3 sleep, 4 flash)
    Device { device: u8 },
    /// Enter standby
    Sleep,
    /// Leave standby
    Wake,
    Reset,
    GetVolume,
    GetEq,
    GetMode,
    GetVersion,
    /// Fetch the number of files on the TF card
    GetFiles,
    /// Fetch the current track index
    GetTrack,
    /// Send an arbitrary command frame
    Raw {
        #[structopt(parse(try_from_str = parse_byte))]
        command: u8,
        #[structopt(parse(try_from_str = parse_byte), default_value = "0")]
        par1: u8,
        #[structopt(parse(try_from_str = parse_byte), default_value = "0")]
        par2: u8,
    },
}

fn parse_byte(s: &str) -> Result<u8, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(h) => u8::from_str_radix(h, 16),
        None => s.parse(),
    }
}

fn main() -> anyhow::Result<()> {
    // Parse out arguments
    let Args {
        port,
        baud,
        options,
        log_level,
        action,
    } = Args::from_args();

    // Configure logger
    let _ = SimpleLogger::init(log_level, Config::default());

    info!("Connecting to serial port");

    let mut p = Player::linux(&port, baud, options)
        .with_context(|| format!("Error connecting to serial port {}", port))?;

    match action {
        Action::Play => p.play()?,
        Action::Pause => p.pause()?,
        Action::Stop => p.stop()?,
        Action::Next => p.next_track()?,
        Action::Previous => p.previous_track()?,
        Action::VolumeUp => p.volume_up()?,
        Action::VolumeDown => p.volume_down()?,
        Action::Volume { level } => p.set_volume(level)?,
        Action::Track { track } => p.play_track(track)?,
        Action::Folder { folder, track } => p.play_folder_and_track(folder, track)?,
        Action::Eq { option } => p.set_equalizer(option)?,
        Action::Mode { option } => p.set_playback_mode(option)?,
        Action::Device { device } => p.set_device(device)?,
        Action::Sleep => p.sleep()?,
        Action::Wake => p.wake()?,
        Action::Reset => p.reset()?,
        Action::GetVolume => println!("{}", p.get_volume()?),
        Action::GetEq => println!("{}", p.get_equalizer()?),
        Action::GetMode => println!("{}", p.get_playback_mode()?),
        Action::GetVersion => println!("{}", p.get_version()?),
        Action::GetFiles => println!("{}", p.get_num_files()?),
        Action::GetTrack => println!("{}", p.get_current_track()?),
        Action::Raw {
            command,
            par1,
            par2,
        } => {
            let f = p.send_command(command, par1, par2)?;
            println!("{}", hex::encode(f.as_bytes()));
        }
    }

    Ok(())
}
