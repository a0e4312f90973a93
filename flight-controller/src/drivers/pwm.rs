use crate::util::error::AppError;

/// Width that switches the pulse train off on the pin.
pub const PULSE_OFF: u16 = 0;

pub trait PulseWidthOutput {
    fn set_pulse_width(&mut self, pin: u8, width_us: u16) -> Result<(), AppError>;
}

impl<T: PulseWidthOutput + ?Sized> PulseWidthOutput for Box<T> {
    fn set_pulse_width(&mut self, pin: u8, width_us: u16) -> Result<(), AppError> {
        (**self).set_pulse_width(pin, width_us)
    }
}
