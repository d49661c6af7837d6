use std::{collections::HashMap, sync::Arc};

use log::info;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};

use crate::{
    config::MeshConfig,
    error::MeshError,
    irq::{pin_mask, PinLatch},
};

/// The reset button and status LED on a Raspberry Pi header.
pub struct PiBoard {
    inputs: HashMap<u8, InputPin>,
    outputs: HashMap<u8, OutputPin>,
}

impl PiBoard {
    pub fn init(config: &MeshConfig, latch: Arc<PinLatch>) -> Result<Self, MeshError> {
        let reset = config
            .reset_pin
            .map(|pin| {
                pin_mask(pin).map(|mask| (pin, mask)).ok_or_else(|| {
                    MeshError::InvalidConfig(format!("reset line GPIO {} cannot be latched", pin))
                })
            })
            .transpose()?;

        let gpio = Gpio::new()?;
        let mut inputs = HashMap::new();
        let mut outputs = HashMap::new();

        if let Some((pin, mask)) = reset {
            info!("Reset line on GPIO {}", pin);
            let mut input = gpio.get(pin)?.into_input_pullup();
            input.set_async_interrupt(Trigger::Both, None, move |_| {
                latch.capture(mask);
            })?;
            inputs.insert(pin, input);
        }

        if let Some(pin) = config.status_led {
            info!("Status LED on GPIO {}", pin);
            outputs.insert(pin, gpio.get(pin)?.into_output_low());
        }

        Ok(Self { inputs, outputs })
    }

    pub fn input_level(&self, pin: u8) -> bool {
        self.inputs
            .get(&pin)
            .map(|input| input.read() == Level::High)
            .unwrap_or(true)
    }

    pub fn set_output(&mut self, pin: u8, high: bool) {
        if let Some(output) = self.outputs.get_mut(&pin) {
            match high {
                true => output.set_high(),
                false => output.set_low(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn reset_line_beyond_the_mask_is_rejected() {
        let (tx, _rx) = mpsc::channel(1);
        let config = MeshConfig {
            reset_pin: Some(40),
            ..MeshConfig::default()
        };

        let result = PiBoard::init(&config, Arc::new(PinLatch::new(tx)));

        assert!(matches!(result, Err(MeshError::InvalidConfig(_))));
    }
}
