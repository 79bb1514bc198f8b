//! DFPlayer Mini serial driver.
//!
//! Builds checksummed command frames, writes them to an embedded-hal serial
//! port and decodes the module's query responses.

use core::marker::PhantomData;

#[macro_use]
extern crate log;

#[macro_use(block)]
extern crate nb;

extern crate embedded_hal;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};

#[cfg(feature = "linux")]
extern crate linux_embedded_hal;

#[cfg(feature = "linux")]
pub mod linux;

pub mod operations;
pub mod protocol;

use operations::Operation;
pub use protocol::{Command, Device, Equalizer, Frame, PlaybackMode, FRAME_SIZE};

/// Byte oriented serial link to the module
pub trait SerialPort<E>: Write<u8, Error = E> + Read<u8, Error = E> {}

impl<T, E> SerialPort<E> for T where T: Write<u8, Error = E> + Read<u8, Error = E> {}

#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum Error<SerialError> {
    #[error("serial error: {0:?}")]
    Serial(SerialError),
    #[error("timeout waiting for module response")]
    ResponseTimeout,
}

impl<SerialError> From<SerialError> for Error<SerialError> {
    fn from(e: SerialError) -> Self {
        Self::Serial(e)
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "structopt", derive(structopt::StructOpt))]
pub struct Options {
    /// Timeout to wait for a complete query response (0 waits forever)
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "500"))]
    pub response_timeout_ms: u32,

    /// Period to poll for response bytes (minimum 1)
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "1"))]
    pub poll_delay_ms: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            response_timeout_ms: 500,
            poll_delay_ms: 1,
        }
    }
}

pub struct Player<P, D, E> {
    options: Options,
    port: P,
    delay: D,
    _err: PhantomData<E>,
}

impl<P, D, E> Player<P, D, E>
where
    P: SerialPort<E>,
    D: DelayMs<u32>,
    E: core::fmt::Debug,
{
    /// Create a new player instance
    pub fn new(port: P, delay: D, options: Options) -> Self {
        Self {
            options,
            port,
            delay,
            _err: PhantomData,
        }
    }

    /// Release the underlying port and delay
    pub fn free(self) -> (P, D) {
        (self.port, self.delay)
    }

    /// Build a frame for `command` and write it to the module.
    ///
    /// The command code and parameters are not validated. Returns the frame
    /// that was sent.
    pub fn send_command(&mut self, command: u8, par1: u8, par2: u8) -> Result<Frame, Error<E>> {
        let frame = Frame::command(command, par1, par2);

        debug!("Sending frame: {:02x?}", frame.as_bytes());

        for b in frame.as_bytes() {
            block!(self.port.write(*b))?;
        }
        block!(self.port.flush())?;

        Ok(frame)
    }

    /// Send a query command and read back the response frame.
    ///
    /// With `response_timeout_ms` set to 0 this blocks until the module
    /// replies, however long that takes.
    pub fn query(&mut self, command: u8) -> Result<Frame, Error<E>> {
        self.send_command(command, 0, 0)?;

        let mut data = [0u8; FRAME_SIZE];
        let mut waited = 0;

        for b in data.iter_mut() {
            *b = self.read_byte(&mut waited)?;
        }

        let frame = Frame::from_bytes(data);

        debug!("Received frame: {:02x?}", frame.as_bytes());

        if !frame.is_valid() {
            warn!(
                "Response framing or checksum mismatch (checksum 0x{:04x}, expected 0x{:04x})",
                frame.checksum(),
                frame.expected_checksum()
            );
        }

        Ok(frame)
    }

    fn read_byte(&mut self, waited: &mut u32) -> Result<u8, Error<E>> {
        if self.options.response_timeout_ms == 0 {
            return Ok(block!(self.port.read())?);
        }

        loop {
            match self.port.read() {
                Err(nb::Error::WouldBlock) => (),
                Err(nb::Error::Other(e)) => return Err(e.into()),
                Ok(v) => return Ok(v),
            };

            // A zero poll period would never advance the timeout
            let poll = self.options.poll_delay_ms.max(1);
            self.delay.delay_ms(poll);
            *waited = waited.saturating_add(poll);

            if *waited >= self.options.response_timeout_ms {
                error!("Response timeout");
                return Err(Error::ResponseTimeout);
            }
        }
    }

    /// Execute a table driven operation, skipping it if the arguments are
    /// out of range
    pub fn execute(&mut self, op: &Operation, a: u16, b: u16) -> Result<(), Error<E>> {
        match op.encode(a, b) {
            Some((par1, par2)) => {
                debug!("{} ({}, {})", op.name, a, b);
                self.send_command(op.command.into(), par1, par2)?;
            }
            None => warn!("Skipping {}: arguments ({}, {}) out of range", op.name, a, b),
        }

        Ok(())
    }

    pub fn play(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::PLAY, 0, 0)
    }

    pub fn pause(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::PAUSE, 0, 0)
    }

    pub fn stop(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::STOP, 0, 0)
    }

    pub fn next_track(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::NEXT, 0, 0)
    }

    pub fn previous_track(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::PREVIOUS, 0, 0)
    }

    pub fn volume_up(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::VOLUME_UP, 0, 0)
    }

    pub fn volume_down(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::VOLUME_DOWN, 0, 0)
    }

    /// Set the volume, levels above 30 are clamped
    pub fn set_volume(&mut self, level: u8) -> Result<(), Error<E>> {
        if level > 30 {
            warn!("Volume {} clamped to 30", level);
        }
        self.execute(&operations::SET_VOLUME, level as u16, 0)
    }

    /// Play a track by index, tracks above 3000 are ignored
    pub fn play_track(&mut self, track: u16) -> Result<(), Error<E>> {
        self.execute(&operations::PLAY_TRACK, track, 0)
    }

    /// Play `track` from numbered `folder`
    pub fn play_folder_and_track(&mut self, folder: u8, track: u16) -> Result<(), Error<E>> {
        self.execute(&operations::PLAY_FOLDER_TRACK, folder as u16, track)
    }

    pub fn set_equalizer<O: Into<u8>>(&mut self, option: O) -> Result<(), Error<E>> {
        let option: u8 = option.into();
        self.execute(&operations::SET_EQUALIZER, option as u16, 0)
    }

    pub fn set_playback_mode<O: Into<u8>>(&mut self, option: O) -> Result<(), Error<E>> {
        let option: u8 = option.into();
        self.execute(&operations::SET_PLAYBACK_MODE, option as u16, 0)
    }

    pub fn set_device<O: Into<u8>>(&mut self, device: O) -> Result<(), Error<E>> {
        let device: u8 = device.into();
        self.execute(&operations::SET_DEVICE, device as u16, 0)
    }

    /// Put the module into standby
    pub fn sleep(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::SLEEP, 0, 0)
    }

    /// Bring the module out of standby
    pub fn wake(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::WAKE, 0, 0)
    }

    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.execute(&operations::RESET, 0, 0)
    }

    pub fn get_volume(&mut self) -> Result<u8, Error<E>> {
        self.query(Command::GetVolume.into()).map(|f| f.param_low())
    }

    pub fn get_equalizer(&mut self) -> Result<u8, Error<E>> {
        self.query(Command::GetEq.into()).map(|f| f.param_low())
    }

    pub fn get_playback_mode(&mut self) -> Result<u8, Error<E>> {
        self.query(Command::GetMode.into()).map(|f| f.param_low())
    }

    /// Fetch the module firmware version
    pub fn get_version(&mut self) -> Result<u8, Error<E>> {
        self.query(Command::GetVersion.into()).map(|f| f.param_low())
    }

    /// Fetch the number of files on the TF card
    pub fn get_num_files(&mut self) -> Result<u16, Error<E>> {
        self.query(Command::GetTrackCount.into()).map(|f| f.param())
    }

    /// Fetch the index of the track currently playing
    pub fn get_current_track(&mut self) -> Result<u16, Error<E>> {
        self.query(Command::GetCurrentTrack.into()).map(|f| f.param())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, PartialEq)]
    struct MockError;

    #[derive(Default)]
    struct MockSerial {
        tx: Vec<u8>,
        rx: VecDeque<u8>,
        flushes: usize,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl Write<u8> for MockSerial {
        type Error = MockError;

        fn write(&mut self, word: u8) -> nb::Result<(), MockError> {
            if self.fail_writes {
                return Err(nb::Error::Other(MockError));
            }
            self.tx.push(word);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), MockError> {
            self.flushes += 1;
            Ok(())
        }
    }

    impl Read<u8> for MockSerial {
        type Error = MockError;

        fn read(&mut self) -> nb::Result<u8, MockError> {
            if self.fail_reads {
                return Err(nb::Error::Other(MockError));
            }
            self.rx.pop_front().ok_or(nb::Error::WouldBlock)
        }
    }

    #[derive(Default)]
    struct MockDelay {
        total_ms: u32,
    }

    impl DelayMs<u32> for MockDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms = self.total_ms.saturating_add(ms);
        }
    }

    fn player() -> Player<MockSerial, MockDelay, MockError> {
        Player::new(MockSerial::default(), MockDelay::default(), Options::default())
    }

    fn response(command: Command, hi: u8, lo: u8) -> Vec<u8> {
        Frame::command(command.into(), hi, lo).as_bytes().to_vec()
    }

    #[test]
    fn send_command_writes_frame() {
        let mut p = player();
        let f = p.send_command(Command::Play.into(), 0, 0).unwrap();

        let (port, _) = p.free();
        assert_eq!(
            port.tx,
            vec![0x7E, 0xFF, 0x06, 0x0D, 0x00, 0x00, 0x00, 0xFE, 0xEE, 0xEF]
        );
        assert_eq!(&port.tx[..], &f.as_bytes()[..]);
        assert_eq!(port.flushes, 1);
    }

    #[test]
    fn repeated_commands_are_identical() {
        let mut p = player();
        p.send_command(0x03, 0x01, 0x2C).unwrap();
        p.send_command(0x03, 0x01, 0x2C).unwrap();

        let (port, _) = p.free();
        assert_eq!(port.tx.len(), 2 * FRAME_SIZE);
        assert_eq!(port.tx[..FRAME_SIZE], port.tx[FRAME_SIZE..]);
    }

    #[test]
    fn volume_above_max_is_clamped() {
        let mut reference = player();
        reference.set_volume(30).unwrap();
        let expected = reference.free().0.tx;
        assert_eq!(expected[3], 0x06);
        assert_eq!(expected[6], 30);

        for level in 31..=255u8 {
            let mut p = player();
            p.set_volume(level).unwrap();
            assert_eq!(p.free().0.tx, expected);
        }
    }

    #[test]
    fn out_of_range_track_sends_nothing() {
        for track in &[3001u16, 65535] {
            let mut p = player();
            p.play_track(*track).unwrap();
            assert!(p.free().0.tx.is_empty());
        }

        let mut p = player();
        p.play_track(300).unwrap();
        let tx = p.free().0.tx;
        assert_eq!(tx[3], 0x03);
        assert_eq!((tx[5], tx[6]), (0x01, 0x2C));
    }

    #[test]
    fn out_of_range_folder_sends_nothing() {
        let mut p = player();
        p.play_folder_and_track(101, 0).unwrap();
        p.play_folder_and_track(0, 256).unwrap();
        assert!(p.free().0.tx.is_empty());

        let mut p = player();
        p.play_folder_and_track(4, 12).unwrap();
        let tx = p.free().0.tx;
        assert_eq!((tx[3], tx[5], tx[6]), (0x0F, 4, 12));
    }

    #[test]
    fn out_of_range_options_send_nothing() {
        let mut p = player();
        p.set_equalizer(6u8).unwrap();
        p.set_playback_mode(4u8).unwrap();
        p.set_device(5u8).unwrap();
        assert!(p.free().0.tx.is_empty());
    }

    #[test]
    fn typed_options_are_encoded() {
        let mut p = player();
        p.set_equalizer(Equalizer::Bass).unwrap();
        p.set_playback_mode(PlaybackMode::Random).unwrap();
        p.set_device(Device::Tf).unwrap();

        let tx = p.free().0.tx;
        assert_eq!((tx[3], tx[6]), (0x07, 5));
        assert_eq!((tx[13], tx[16]), (0x08, 3));
        assert_eq!((tx[23], tx[26]), (0x09, 1));
    }

    #[test]
    fn transport_commands_use_expected_codes() {
        let mut p = player();
        p.play().unwrap();
        p.pause().unwrap();
        p.stop().unwrap();
        p.next_track().unwrap();
        p.previous_track().unwrap();
        p.volume_up().unwrap();
        p.volume_down().unwrap();
        p.sleep().unwrap();
        p.wake().unwrap();
        p.reset().unwrap();

        let codes: Vec<u8> = p.free().0.tx.chunks(FRAME_SIZE).map(|f| f[3]).collect();
        assert_eq!(
            codes,
            vec![0x0D, 0x0E, 0x16, 0x01, 0x02, 0x04, 0x05, 0x0A, 0x0B, 0x0C]
        );
    }

    #[test]
    fn get_num_files_reads_word() {
        let mut p = player();
        p.port.rx.extend(response(Command::GetTrackCount, 0x00, 0x0A));

        assert_eq!(p.get_num_files().unwrap(), 10);

        let (port, _) = p.free();
        assert_eq!(&port.tx[..], &Frame::command(0x48, 0, 0).as_bytes()[..]);
        assert!(port.rx.is_empty());
    }

    #[test]
    fn get_current_track_reads_word() {
        let mut p = player();
        p.port.rx.extend(response(Command::GetCurrentTrack, 0x01, 0x2C));
        assert_eq!(p.get_current_track().unwrap(), 300);
    }

    #[test]
    fn single_byte_queries() {
        let mut p = player();
        p.port.rx.extend(response(Command::GetVolume, 0x00, 22));
        p.port.rx.extend(response(Command::GetEq, 0x00, 3));
        p.port.rx.extend(response(Command::GetMode, 0x00, 2));
        p.port.rx.extend(response(Command::GetVersion, 0x00, 8));

        assert_eq!(p.get_volume().unwrap(), 22);
        assert_eq!(p.get_equalizer().unwrap(), 3);
        assert_eq!(p.get_playback_mode().unwrap(), 2);
        assert_eq!(p.get_version().unwrap(), 8);

        let codes: Vec<u8> = p.free().0.tx.chunks(FRAME_SIZE).map(|f| f[3]).collect();
        assert_eq!(codes, vec![0x43, 0x44, 0x45, 0x46]);
    }

    #[test]
    fn invalid_response_is_still_returned() {
        let mut p = player();
        let mut r = response(Command::GetVolume, 0x00, 17);
        r[8] ^= 0xFF;
        p.port.rx.extend(r);

        let f = p.query(Command::GetVolume.into()).unwrap();
        assert!(!f.is_valid());
        assert_eq!(f.param_low(), 17);
    }

    #[test]
    fn missing_response_times_out() {
        let mut p = player();
        p.port.rx.extend(vec![0x7E, 0xFF, 0x06]);

        assert_eq!(p.get_volume(), Err(Error::ResponseTimeout));

        let (_, delay) = p.free();
        assert_eq!(delay.total_ms, Options::default().response_timeout_ms);
    }

    #[test]
    fn read_errors_are_propagated() {
        let mut p = player();
        p.port.fail_reads = true;
        assert_eq!(p.get_equalizer(), Err(Error::Serial(MockError)));
    }

    #[test]
    fn write_errors_are_propagated() {
        let mut p = player();
        p.port.fail_writes = true;

        assert_eq!(p.send_command(0x0D, 0, 0), Err(Error::Serial(MockError)));
        assert_eq!(p.play(), Err(Error::Serial(MockError)));
        assert_eq!(p.get_volume(), Err(Error::Serial(MockError)));

        let (port, _) = p.free();
        assert!(port.tx.is_empty());
        assert_eq!(port.flushes, 0);
    }

    #[test]
    fn zero_poll_delay_still_times_out() {
        let options = Options {
            response_timeout_ms: 500,
            poll_delay_ms: 0,
        };
        let mut p = Player::new(MockSerial::default(), MockDelay::default(), options);

        assert_eq!(p.get_num_files(), Err(Error::ResponseTimeout));
        assert_eq!(p.free().1.total_ms, 500);
    }

    #[test]
    fn large_poll_delay_does_not_overflow() {
        let options = Options {
            response_timeout_ms: u32::MAX,
            poll_delay_ms: u32::MAX,
        };
        let mut p = Player::new(MockSerial::default(), MockDelay::default(), options);

        assert_eq!(p.get_volume(), Err(Error::ResponseTimeout));
    }

    #[test]
    fn zero_timeout_blocks_until_response() {
        let options = Options {
            response_timeout_ms: 0,
            ..Options::default()
        };
        let mut p = Player::new(MockSerial::default(), MockDelay::default(), options);
        p.port.rx.extend(response(Command::GetCurrentTrack, 0x00, 0x05));

        assert_eq!(p.get_current_track().unwrap(), 5);
        assert_eq!(p.free().1.total_ms, 0);
    }
}
