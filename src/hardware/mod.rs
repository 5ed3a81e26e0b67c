//! Hardware boundary for the joystick.
//!
//! The conditioning pipeline only sees two traits: [`AnalogChannel`] for the axes and
//! [`ButtonInput`] for the press button. Reads are treated as infallible at this
//! boundary; implementations deal with transport errors themselves.
//!
//! [`rppal_io`] provides the Raspberry Pi implementations (MCP3208 over SPI, GPIO
//! button with pull-up).

pub mod rppal_io;

pub use rppal_io::{AdcChannel, GpioButton, SpiAdc};

/// A single analog input producing samples in the native `0..=65535` range.
pub trait AnalogChannel {
    fn read_raw(&mut self) -> u16;
}

/// A digital input wired to the joystick's press button.
pub trait ButtonInput {
    /// Current logic level, `true` for high.
    fn level(&self) -> bool;

    /// Level that means "pressed". Buttons are pulled up, so pressing pulls the line low.
    fn active_level(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("ADC channel {0} does not exist (MCP3208 has channels 0-7)")]
    InvalidChannel(u8),

    #[error("unsupported SPI {0}")]
    InvalidBus(String),
}
