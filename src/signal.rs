//! Human-readable console output and error signalling.

use core::convert::Infallible;
use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

const BLINK_ON_MS: u32 = 300;
const BLINK_OFF_MS: u32 = 300;
const BLINK_PAUSE_MS: u32 = 1000;

/// Line-oriented text output (the serial port on hardware).
pub trait Console {
    fn write_line(&mut self, line: fmt::Arguments<'_>);
}

impl<T: Console + ?Sized> Console for &mut T {
    fn write_line(&mut self, line: fmt::Arguments<'_>) {
        (**self).write_line(line)
    }
}

/// Sink for numeric error codes.
pub trait Diagnostics {
    fn signal(&mut self, code: u8);
}

/// Blinks an LED `code` times followed by a pause.
///
/// The LED pin must be infallible, as GPIO outputs are on the supported
/// boards.
///
/// Firmware calls [`Diagnostics::signal`] in a loop after a fatal error, so
/// one call renders exactly one burst.
pub struct BlinkCode<P, D> {
    led: P,
    delay: D,
}

impl<P, D> BlinkCode<P, D>
where
    P: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    pub fn new(led: P, delay: D) -> Self {
        Self { led, delay }
    }

    pub fn release(self) -> (P, D) {
        (self.led, self.delay)
    }
}

impl<P, D> Diagnostics for BlinkCode<P, D>
where
    P: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    fn signal(&mut self, code: u8) {
        for _ in 0..code {
            let Ok(()) = self.led.set_high();
            self.delay.delay_ms(BLINK_ON_MS);
            let Ok(()) = self.led.set_low();
            self.delay.delay_ms(BLINK_OFF_MS);
        }
        self.delay.delay_ms(BLINK_PAUSE_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingLed {
        rising_edges: u32,
        high: bool,
    }

    impl embedded_hal::digital::ErrorType for RecordingLed {
        type Error = Infallible;
    }

    impl OutputPin for RecordingLed {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            if !self.high {
                self.rising_edges += 1;
            }
            self.high = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += u64::from(ns) / 1_000_000;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
        }
    }

    #[test]
    fn test_blink_code_blinks_code_times() {
        let mut blink = BlinkCode::new(RecordingLed::default(), CountingDelay::default());
        blink.signal(5);

        let (led, delay) = blink.release();
        assert_eq!(led.rising_edges, 5);
        assert!(!led.high, "LED must end dark");
        assert_eq!(delay.total_ms, 5 * 600 + 1000);
    }
}
