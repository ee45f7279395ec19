//! DHT22 (AM2302) single-wire protocol decoder.
//!
//! ## Protocol
//!
//! 1. Host releases the line high, then drives it low for ~20 ms.
//! 2. Host releases the line and switches to input mode.
//! 3. Sensor answers with a start pulse (~80 µs low, ~80 µs high).
//! 4. Sensor sends 40 bits. Each bit is a ~50 µs low phase followed by a
//!    high phase of ~26 µs (bit 0) or ~70 µs (bit 1).
//!
//! No clock is shared with the sensor, so each bit is decided by comparing
//! how long the line stayed low against how long it stayed high, both
//! counted in line polls. The whole exchange runs inside a critical section:
//! an interrupt in the middle of a phase would stretch it and flip the bit.
//!
//! ## Frame
//!
//! | Byte | Content |
//! |------|---------|
//! | 0-1  | Humidity × 10, bit 7 of byte 0 is the sign |
//! | 2-3  | Temperature × 10, bit 7 of byte 2 is the sign |
//! | 4    | Sum of bytes 0-3, truncated to 8 bits |

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;

use super::{DecodeError, DualModeLine, Phase, Reading, Sensor};
use crate::config::LoggerConfig;

/// Data bits in one frame
pub const FRAME_BITS: usize = 40;

const FRAME_BYTES: usize = FRAME_BITS / 8;
const SIGN_FLAG: u8 = 0x80;
const MAGNITUDE_MAX: u16 = 0x7fff;

/// Line held high after the start signal before switching to input
const START_RELEASE_US: u32 = 40;
/// Wait after switching to input before polling the sensor's reply
const INPUT_SETTLE_US: u32 = 10;

/// One raw 40-bit transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_BYTES],
}

impl Frame {
    pub const fn from_bytes(bytes: [u8; FRAME_BYTES]) -> Self {
        Self { bytes }
    }

    pub const fn as_bytes(&self) -> &[u8; FRAME_BYTES] {
        &self.bytes
    }

    /// Encode a reading the way the sensor would transmit it, checksum included.
    ///
    /// Values are rounded to the sensor's 0.1 resolution.
    pub fn from_reading(reading: Reading) -> Self {
        let [h_hi, h_lo] = encode_value(reading.humidity);
        let [t_hi, t_lo] = encode_value(reading.temperature);
        let mut frame = Self::from_bytes([h_hi, h_lo, t_hi, t_lo, 0]);
        frame.bytes[4] = frame.expected_checksum();
        frame
    }

    /// Checksum computed over the four data bytes.
    pub fn expected_checksum(&self) -> u8 {
        self.bytes[..4]
            .iter()
            .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
    }

    /// Verify the frame checksum and scale the payload into a reading.
    pub fn decode(&self) -> Result<Reading, DecodeError> {
        let expected = self.expected_checksum();
        let actual = self.bytes[4];
        if expected != actual {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }

        Ok(Reading {
            humidity: decode_value(self.bytes[0], self.bytes[1]),
            temperature: decode_value(self.bytes[2], self.bytes[3]),
        })
    }
}

fn decode_value(high: u8, low: u8) -> f32 {
    let magnitude = u16::from_be_bytes([high & !SIGN_FLAG, low]);
    let value = f32::from(magnitude) / 10.0;
    if high & SIGN_FLAG != 0 { -value } else { value }
}

fn encode_value(value: f32) -> [u8; 2] {
    let negative = value < 0.0;
    let magnitude = if negative { -value } else { value };
    // `as` saturates, NaN becomes 0
    let scaled = ((magnitude * 10.0 + 0.5) as u16).min(MAGNITUDE_MAX);
    let [mut high, low] = scaled.to_be_bytes();
    if negative && scaled != 0 {
        high |= SIGN_FLAG;
    }
    [high, low]
}

/// DHT22 driver over an exclusively owned data line and delay provider.
pub struct Dht22<L, D> {
    line: L,
    delay: D,
    pulse_timeout: u32,
    settle_ms: u32,
    start_low_ms: u32,
}

impl<L: DualModeLine, D: DelayNs> Dht22<L, D> {
    pub fn new(line: L, delay: D) -> Self {
        Self::with_config(line, delay, &LoggerConfig::default())
    }

    pub fn with_config(mut line: L, delay: D, config: &LoggerConfig) -> Self {
        // Idle state: released and pulled up
        line.set_as_input();
        Self {
            line,
            delay,
            pulse_timeout: config.pulse_timeout,
            settle_ms: config.settle_ms,
            start_low_ms: config.start_low_ms,
        }
    }

    pub fn release(self) -> (L, D) {
        (self.line, self.delay)
    }

    /// Trigger a conversion and capture one raw frame.
    ///
    /// The frame checksum is not checked here, see [`Frame::decode`].
    pub fn read_frame(&mut self) -> Result<Frame, DecodeError> {
        let Ok(()) = self.line.set_high();
        self.delay.delay_ms(self.settle_ms);

        let result = critical_section::with(|_| self.transfer());

        match &result {
            Ok(frame) => debug!("DHT22 frame: {:02x?}", frame.as_bytes()),
            Err(e) => debug!("DHT22 transfer aborted: {}", e),
        }
        result
    }

    fn transfer(&mut self) -> Result<Frame, DecodeError> {
        self.line.set_as_output();
        let Ok(()) = self.line.set_low();
        self.delay.delay_ms(self.start_low_ms);
        let Ok(()) = self.line.set_high();
        self.delay.delay_us(START_RELEASE_US);
        self.line.set_as_input();
        self.delay.delay_us(INPUT_SETTLE_US);

        self.measure_pulse(Phase::StartPulse)?;

        let mut bytes = [0u8; FRAME_BYTES];
        for bit in 0..FRAME_BITS {
            let one = self.measure_pulse(Phase::Bit(bit as u8))?;
            let byte = &mut bytes[bit / 8];
            *byte = (*byte << 1) | u8::from(one);
        }
        Ok(Frame::from_bytes(bytes))
    }

    /// Time one low phase and the high phase after it.
    ///
    /// Returns `true` when the high phase lasted longer.
    fn measure_pulse(&mut self, phase: Phase) -> Result<bool, DecodeError> {
        let low = self.count_while(false, phase)?;
        let high = self.count_while(true, phase)?;
        Ok(high > low)
    }

    fn count_while(&mut self, high: bool, phase: Phase) -> Result<u32, DecodeError> {
        let mut count = 0u32;
        while self.line_is_high() == high {
            count += 1;
            if count > self.pulse_timeout {
                return Err(DecodeError::Timeout { phase });
            }
        }
        Ok(count)
    }

    fn line_is_high(&mut self) -> bool {
        let Ok(high) = self.line.is_high();
        high
    }
}

impl<L: DualModeLine, D: DelayNs> Sensor for Dht22<L, D> {
    fn read(&mut self) -> Result<Reading, DecodeError> {
        self.read_frame()?.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
    use std::collections::VecDeque;

    const TIMEOUT: u32 = 50;

    /// Line that replays a recorded waveform once the host switches to input.
    struct ScriptedLine {
        phases: VecDeque<(bool, u32)>,
        listening: bool,
        start_signal_sent: bool,
        driven_high: bool,
    }

    impl ScriptedLine {
        fn new(phases: Vec<(bool, u32)>) -> Self {
            Self {
                phases: phases.into(),
                listening: false,
                start_signal_sent: false,
                driven_high: true,
            }
        }

        fn poll(&mut self) -> bool {
            if !self.listening {
                return self.driven_high;
            }
            while let Some((level, remaining)) = self.phases.front_mut() {
                if *remaining > 0 {
                    *remaining -= 1;
                    return *level;
                }
                self.phases.pop_front();
            }
            // Pull-up keeps an idle line high
            true
        }
    }

    impl ErrorType for ScriptedLine {
        type Error = Infallible;
    }

    impl InputPin for ScriptedLine {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.poll())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.poll())
        }
    }

    impl OutputPin for ScriptedLine {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.driven_high = false;
            self.start_signal_sent = true;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.driven_high = true;
            Ok(())
        }
    }

    impl DualModeLine for ScriptedLine {
        fn set_as_input(&mut self) {
            self.listening = self.start_signal_sent;
        }

        fn set_as_output(&mut self) {
            self.listening = false;
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn waveform(bytes: [u8; 5]) -> Vec<(bool, u32)> {
        let mut phases = vec![(false, 8), (true, 8)];
        for byte in bytes {
            for bit in (0..8).rev() {
                let one = byte & (1 << bit) != 0;
                phases.push((false, 5));
                phases.push((true, if one { 7 } else { 3 }));
            }
        }
        // Sensor pulls low once more to end the last bit
        phases.push((false, 5));
        phases
    }

    fn sensor(phases: Vec<(bool, u32)>) -> Dht22<ScriptedLine, NoDelay> {
        let config = LoggerConfig::default().with_pulse_timeout(TIMEOUT);
        Dht22::with_config(ScriptedLine::new(phases), NoDelay, &config)
    }

    #[test]
    fn test_decode_positive_frame() {
        // 65.2 %RH, 35.1 °C
        let frame = Frame::from_bytes([0x02, 0x8c, 0x01, 0x5f, 0xee]);
        let reading = frame.decode().unwrap();
        assert_eq!(reading, Reading::new(35.1, 65.2));
    }

    #[test]
    fn test_decode_negative_temperature() {
        // -10.1 °C
        let frame = Frame::from_bytes([0x01, 0xf4, 0x80, 0x65, 0xda]);
        let reading = frame.decode().unwrap();
        assert_eq!(reading.temperature, -10.1);
        assert_eq!(reading.humidity, 50.0);
    }

    #[test]
    fn test_checksum_wraps_to_eight_bits() {
        let frame = Frame::from_bytes([0xff, 0xff, 0x01, 0x02, 0x00]);
        assert_eq!(frame.expected_checksum(), 0x01);
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let frame = Frame::from_bytes([0x02, 0x8c, 0x01, 0x5f, 0xef]);
        assert_eq!(
            frame.decode(),
            Err(DecodeError::ChecksumMismatch {
                expected: 0xee,
                actual: 0xef,
            })
        );
    }

    #[test]
    fn test_encode_matches_sensor_bytes() {
        let frame = Frame::from_reading(Reading::new(-10.1, 50.0));
        assert_eq!(frame.as_bytes(), &[0x01, 0xf4, 0x80, 0x65, 0xda]);
    }

    #[test]
    fn test_read_full_waveform() {
        let bytes = [0x02, 0x8c, 0x01, 0x5f, 0xee];
        let mut dht = sensor(waveform(bytes));

        let reading = dht.read().unwrap();
        assert_eq!(reading, Reading::new(35.1, 65.2));

        let (line, _) = dht.release();
        assert!(line.start_signal_sent, "start signal must be driven low");
    }

    #[test]
    fn test_read_frame_returns_raw_bytes() {
        let bytes = [0x01, 0xf4, 0x80, 0x65, 0xda];
        let mut dht = sensor(waveform(bytes));
        assert_eq!(dht.read_frame().unwrap().as_bytes(), &bytes);
    }

    #[test]
    fn test_silent_sensor_times_out_on_start_pulse() {
        let mut dht = sensor(Vec::new());
        assert_eq!(
            dht.read(),
            Err(DecodeError::Timeout {
                phase: Phase::StartPulse
            })
        );
    }

    #[test]
    fn test_stretched_bit_times_out_without_reading() {
        let mut phases = waveform([0x02, 0x8c, 0x01, 0x5f, 0xee]);
        // Start pulse occupies two phases, every bit two more
        let bit = 17;
        phases[2 + bit * 2 + 1].1 = TIMEOUT + 10;
        let mut dht = sensor(phases);

        assert_eq!(
            dht.read(),
            Err(DecodeError::Timeout {
                phase: Phase::Bit(bit as u8)
            })
        );
    }

    #[test]
    fn test_stretched_low_phase_times_out() {
        let mut phases = waveform([0x02, 0x8c, 0x01, 0x5f, 0xee]);
        let bit = 23;
        phases[2 + bit * 2].1 = TIMEOUT + 10;
        let mut dht = sensor(phases);

        assert_eq!(
            dht.read(),
            Err(DecodeError::Timeout {
                phase: Phase::Bit(bit as u8)
            })
        );
    }

    #[test]
    fn test_corrupted_bit_reports_checksum_mismatch() {
        let mut phases = waveform([0x02, 0x8c, 0x01, 0x5f, 0xee]);
        // Turn the last bit of byte 3 from 1 into 0
        phases[2 + 31 * 2 + 1].1 = 3;
        let mut dht = sensor(phases);

        assert_eq!(
            dht.read(),
            Err(DecodeError::ChecksumMismatch {
                expected: 0xed,
                actual: 0xee,
            })
        );
    }
}
