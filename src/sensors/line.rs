//! Single-wire data line that switches between driving and listening.
//!
//! The DHT22 shares one wire for the host's start signal and the sensor's
//! reply, so the host drives the pin as an output and then hands the line
//! back by switching it to input mode.

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// A GPIO that can be switched between input and output mode at runtime.
///
/// Pin operations are infallible: a protocol decoder polling in a critical
/// section has no way to recover from a failing GPIO read.
pub trait DualModeLine: InputPin + OutputPin + ErrorType<Error = Infallible> {
    /// Stop driving the line and observe it
    fn set_as_input(&mut self);

    /// Drive the line with the last level set
    fn set_as_output(&mut self);
}

impl<T: DualModeLine + ?Sized> DualModeLine for &mut T {
    fn set_as_input(&mut self) {
        (**self).set_as_input()
    }

    fn set_as_output(&mut self) {
        (**self).set_as_output()
    }
}

/// Adapts an open-drain pin with a pull-up to [`DualModeLine`].
///
/// An open-drain output only ever pulls the line low, so "input mode" is
/// simply the released (high) state and the pin can be read at any time.
pub struct OpenDrainLine<P> {
    pin: P,
}

impl<P> OpenDrainLine<P>
where
    P: InputPin + OutputPin + ErrorType<Error = Infallible>,
{
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: ErrorType<Error = Infallible>> ErrorType for OpenDrainLine<P> {
    type Error = Infallible;
}

impl<P> InputPin for OpenDrainLine<P>
where
    P: InputPin + OutputPin + ErrorType<Error = Infallible>,
{
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.pin.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.pin.is_low()
    }
}

impl<P> OutputPin for OpenDrainLine<P>
where
    P: InputPin + OutputPin + ErrorType<Error = Infallible>,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high()
    }
}

impl<P> DualModeLine for OpenDrainLine<P>
where
    P: InputPin + OutputPin + ErrorType<Error = Infallible>,
{
    fn set_as_input(&mut self) {
        let Ok(()) = self.pin.set_high();
    }

    fn set_as_output(&mut self) {}
}
