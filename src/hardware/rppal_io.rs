use super::{AnalogChannel, ButtonInput, HardwareError};
use crate::config::HardwareSettings;
use rppal::gpio::{Gpio, InputPin, Level};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MCP3208_CHANNELS: u8 = 8;

/// MCP3208 12-bit ADC on the SPI bus. Both axes share one device.
#[derive(Debug, Clone)]
pub struct SpiAdc {
    spi: Arc<Spi>,
}

impl SpiAdc {
    pub fn open(settings: &HardwareSettings) -> Result<Self, HardwareError> {
        let bus = match settings.spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(HardwareError::InvalidBus(format!("bus {other}"))),
        };
        let slave_select = match settings.slave_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(HardwareError::InvalidBus(format!("slave select {other}"))),
        };

        info!(
            "Opening MCP3208 on {:?}/{:?} at {} Hz",
            bus, slave_select, settings.clock_hz
        );
        let spi = Spi::new(bus, slave_select, settings.clock_hz, Mode::Mode0)?;
        Ok(Self { spi: Arc::new(spi) })
    }

    pub fn channel(&self, channel: u8) -> Result<AdcChannel, HardwareError> {
        if channel >= MCP3208_CHANNELS {
            return Err(HardwareError::InvalidChannel(channel));
        }
        Ok(AdcChannel {
            spi: Arc::clone(&self.spi),
            channel,
            last_sample: 0,
        })
    }
}

/// One single-ended input of the [`SpiAdc`].
#[derive(Debug)]
pub struct AdcChannel {
    spi: Arc<Spi>,
    channel: u8,
    last_sample: u16,
}

impl AdcChannel {
    fn transfer(&self) -> Result<u16, rppal::spi::Error> {
        // start bit, single-ended, channel D2 | D1 D0 | padding
        let write = [
            0x06 | (self.channel >> 2),
            (self.channel & 0x03) << 6,
            0x00,
        ];
        let mut read = [0u8; 3];
        self.spi.transfer(&mut read, &write)?;
        Ok((u16::from(read[1] & 0x0F) << 8) | u16::from(read[2]))
    }
}

impl AnalogChannel for AdcChannel {
    /// 12-bit conversion widened to 16 bits, so full scale reads as 65535.
    fn read_raw(&mut self) -> u16 {
        match self.transfer() {
            Ok(sample) => {
                self.last_sample = (sample << 4) | (sample >> 8);
            }
            Err(e) => {
                warn!(
                    "ADC channel {} read failed, repeating last sample: {}",
                    self.channel, e
                );
            }
        }
        self.last_sample
    }
}

/// Press button on a GPIO pin with the internal pull-up enabled.
#[derive(Debug)]
pub struct GpioButton {
    pin: InputPin,
}

impl GpioButton {
    pub fn new(pin: u8) -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;
        let pin = gpio.get(pin)?.into_input_pullup();
        debug!("Button configured on GPIO {}", pin.pin());
        Ok(Self { pin })
    }
}

impl ButtonInput for GpioButton {
    fn level(&self) -> bool {
        self.pin.read() == Level::High
    }
}
