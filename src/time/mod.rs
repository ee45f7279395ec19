//! Wall-clock and low-power sleep capabilities.
//!
//! Both are owned handles passed to the scheduler; there is no global RTC or
//! timer state.

mod calendar;

pub use calendar::{DateTime, format_duration};

/// Real-time clock reporting Unix seconds.
pub trait Clock {
    fn now(&mut self) -> u32;

    /// False if the oscillator was found stopped (e.g. backup battery lost).
    /// The time is then of unknown accuracy but still advances.
    fn is_running(&mut self) -> bool {
        true
    }
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now(&mut self) -> u32 {
        (**self).now()
    }

    fn is_running(&mut self) -> bool {
        (**self).is_running()
    }
}

/// Processor suspension between samples.
pub trait PowerSave {
    /// Halt the CPU for roughly `seconds`. Wake-up is a scheduling event only.
    fn sleep(&mut self, seconds: u32);

    /// Power down with every wake source disabled.
    ///
    /// On hardware this never returns; only a reset leaves it. Host
    /// implementations return so the caller can observe the end of the run.
    fn halt(&mut self);
}

impl<T: PowerSave + ?Sized> PowerSave for &mut T {
    fn sleep(&mut self, seconds: u32) {
        (**self).sleep(seconds)
    }

    fn halt(&mut self) {
        (**self).halt()
    }
}
