//! Multiplexer adapter: drives the 16:1 analog mux's four binary-select
//! GPIOs (S0 = LSB) from a mux index `0..=15`.

use crate::app::ports::MultiplexerPort;
use crate::pins;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

/// Binary-select GPIO multiplexer driver.
pub struct GpioMultiplexer {
    last_index: u8,
}

impl GpioMultiplexer {
    #[must_use]
    pub fn new() -> Self {
        Self { last_index: 0xFF }
    }

    #[must_use]
    pub fn last_index(&self) -> u8 {
        self.last_index
    }
}

impl Default for GpioMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplexerPort for GpioMultiplexer {
    fn set_channel(&mut self, mux_index: u8) {
        let bits = [
            mux_index & 0b0001 != 0,
            mux_index & 0b0010 != 0,
            mux_index & 0b0100 != 0,
            mux_index & 0b1000 != 0,
        ];
        let gpios = [
            pins::MULTIPLEXER_S0_GPIO,
            pins::MULTIPLEXER_S1_GPIO,
            pins::MULTIPLEXER_S2_GPIO,
            pins::MULTIPLEXER_S3_GPIO,
        ];

        #[cfg(target_os = "espidf")]
        for (gpio, level) in gpios.iter().zip(bits.iter()) {
            hw_init::gpio_write(*gpio, *level);
        }

        #[cfg(not(target_os = "espidf"))]
        let _ = (gpios, bits);

        self.last_index = mux_index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_last_selected_index() {
        let mut mux = GpioMultiplexer::new();
        mux.set_channel(7);
        assert_eq!(mux.last_index(), 7);
        mux.set_channel(15);
        assert_eq!(mux.last_index(), 15);
    }
}
