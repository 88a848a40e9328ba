//! Raspberry Pi drivers built on `rppal`.
//!
//! Only compiled with the `gpio` feature. Pin numbers are BCM numbers, matching
//! the wiring of the reference board: PIR on 4, HC-SR04 trigger/echo on 23/24,
//! MFRC522 on SPI0 CE0 with its reset line on 25.

use crate::{
    HardwareError, Result,
    mfrc522::{Mfrc522, RegisterBus, spi_address},
    traits::{CardReader, DistanceSensor, Indicator, MotionSensor},
    types::{CardRead, DeviceInfo},
};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Speed of sound at ~20°C, in meters per second.
const SPEED_OF_SOUND_M_S: f64 = 343.0;

/// How long to wait for the echo line to rise or fall.
const ECHO_TIMEOUT: Duration = Duration::from_millis(40);

fn gpio_error(e: rppal::gpio::Error) -> HardwareError {
    HardwareError::initialization_failed(e.to_string())
}

fn input_pin(bcm: u8) -> Result<InputPin> {
    Ok(Gpio::new()
        .map_err(gpio_error)?
        .get(bcm)
        .map_err(gpio_error)?
        .into_input_pulldown())
}

fn output_pin(bcm: u8) -> Result<OutputPin> {
    let mut pin = Gpio::new()
        .map_err(gpio_error)?
        .get(bcm)
        .map_err(gpio_error)?
        .into_output_low();
    pin.set_reset_on_drop(true);
    Ok(pin)
}

// ==============================================================================
// PIR motion sensor
// ==============================================================================

/// HC-SR501 style PIR module on a single input pin.
///
/// The pin level is sampled every `poll` instead of using interrupts so the
/// wait stays cancel-safe inside `tokio::select!`.
pub struct GpioMotionSensor {
    pin: InputPin,
    bcm: u8,
    poll: Duration,
}

impl GpioMotionSensor {
    pub fn new(bcm: u8) -> Result<Self> {
        tracing::info!(pin = bcm, "Using GPIO PIR sensor");
        Ok(Self {
            pin: input_pin(bcm)?,
            bcm,
            poll: Duration::from_millis(20),
        })
    }

    async fn wait_for_level(&self, level: Level) -> Result<()> {
        while self.pin.read() != level {
            tokio::time::sleep(self.poll).await;
        }
        Ok(())
    }
}

impl MotionSensor for GpioMotionSensor {
    async fn wait_for_presence(&mut self) -> Result<()> {
        self.wait_for_level(Level::High).await
    }

    async fn wait_for_absence(&mut self) -> Result<()> {
        self.wait_for_level(Level::Low).await
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new("PIR", "HC-SR501").with_pins([self.bcm]))
    }
}

// ==============================================================================
// HC-SR04 ultrasonic ranger
// ==============================================================================

struct UltrasonicPins {
    trigger: OutputPin,
    echo: InputPin,
}

impl UltrasonicPins {
    fn wait_echo(&self, level: Level, deadline: Instant) -> Result<Instant> {
        while self.echo.read() != level {
            if Instant::now() >= deadline {
                return Err(HardwareError::timeout(ECHO_TIMEOUT.as_millis() as u64));
            }
        }
        Ok(Instant::now())
    }

    /// Fire one 10µs pulse and time the echo. Busy-waits; run off the runtime.
    fn measure(&mut self, max_distance_m: f64) -> Result<f64> {
        self.trigger.set_low();
        std::thread::sleep(Duration::from_micros(2));
        self.trigger.set_high();
        std::thread::sleep(Duration::from_micros(10));
        self.trigger.set_low();

        let rise = self.wait_echo(Level::High, Instant::now() + ECHO_TIMEOUT)?;
        let fall = match self.wait_echo(Level::Low, rise + ECHO_TIMEOUT) {
            Ok(fall) => fall,
            // Echo held high past the timeout: nothing in range.
            Err(_) => return Ok(max_distance_m),
        };

        let meters = (fall - rise).as_secs_f64() * SPEED_OF_SOUND_M_S / 2.0;
        Ok(meters.min(max_distance_m))
    }
}

/// HC-SR04 ranger on a trigger/echo pin pair.
pub struct GpioDistanceSensor {
    pins: Arc<Mutex<UltrasonicPins>>,
    trigger_bcm: u8,
    echo_bcm: u8,
    max_distance_m: f64,
}

impl GpioDistanceSensor {
    pub fn new(trigger_bcm: u8, echo_bcm: u8, max_distance_m: f64) -> Result<Self> {
        tracing::info!(
            trigger = trigger_bcm,
            echo = echo_bcm,
            "Using GPIO ultrasonic sensor"
        );
        let pins = UltrasonicPins {
            trigger: output_pin(trigger_bcm)?,
            echo: input_pin(echo_bcm)?,
        };
        Ok(Self {
            pins: Arc::new(Mutex::new(pins)),
            trigger_bcm,
            echo_bcm,
            max_distance_m,
        })
    }
}

impl DistanceSensor for GpioDistanceSensor {
    async fn read_distance(&mut self) -> Result<f64> {
        let pins = Arc::clone(&self.pins);
        let max = self.max_distance_m;

        tokio::task::spawn_blocking(move || {
            let mut pins = pins
                .lock()
                .map_err(|_| HardwareError::other("ultrasonic pin lock poisoned"))?;
            pins.measure(max)
        })
        .await
        .map_err(|e| HardwareError::other(format!("task join error: {}", e)))?
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new("Ultrasonic", "HC-SR04").with_pins([self.trigger_bcm, self.echo_bcm]))
    }
}

// ==============================================================================
// MFRC522 card reader
// ==============================================================================

/// SPI clock for the MFRC522.
const SPI_CLOCK_HZ: u32 = 1_000_000;

/// Pause between empty-field polls.
const CARD_POLL: Duration = Duration::from_millis(100);

fn spi_error(e: rppal::spi::Error) -> HardwareError {
    HardwareError::communication(e.to_string())
}

struct SpiBus {
    spi: Spi,
}

impl RegisterBus for SpiBus {
    fn read_register(&mut self, reg: u8) -> Result<u8> {
        let mut rx = [0u8; 2];
        self.spi
            .transfer(&mut rx, &[spi_address(reg, true), 0])
            .map_err(spi_error)?;
        Ok(rx[1])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.spi
            .write(&[spi_address(reg, false), value])
            .map_err(spi_error)?;
        Ok(())
    }
}

/// MFRC522 module on SPI0 CE0.
///
/// Each poll runs on the blocking pool; an empty field is retried every
/// [`CARD_POLL`] until a card answers.
pub struct GpioCardReader {
    chip: Arc<Mutex<Mfrc522<SpiBus>>>,
    // Held high while the reader is alive; dropping it powers the chip down.
    _reset: OutputPin,
    reset_bcm: u8,
    version: u8,
}

impl GpioCardReader {
    pub fn new(reset_bcm: u8) -> Result<Self> {
        let mut reset = output_pin(reset_bcm)?;
        reset.set_high();
        std::thread::sleep(Duration::from_millis(50));

        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| HardwareError::initialization_failed(e.to_string()))?;
        let mut chip = Mfrc522::new(SpiBus { spi })?;
        let version = chip.version()?;
        tracing::info!(
            reset = reset_bcm,
            version,
            "Using MFRC522 card reader"
        );

        Ok(Self {
            chip: Arc::new(Mutex::new(chip)),
            _reset: reset,
            reset_bcm,
            version,
        })
    }
}

impl std::fmt::Debug for GpioCardReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioCardReader")
            .field("reset_bcm", &self.reset_bcm)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl CardReader for GpioCardReader {
    async fn read_tag(&mut self) -> Result<CardRead> {
        loop {
            let chip = Arc::clone(&self.chip);
            let read = tokio::task::spawn_blocking(move || {
                chip.lock()
                    .map_err(|_| HardwareError::other("card reader lock poisoned"))?
                    .poll()
            })
            .await
            .map_err(|e| HardwareError::other(format!("task join error: {}", e)))??;

            if let Some(read) = read {
                return Ok(read);
            }
            tokio::time::sleep(CARD_POLL).await;
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new("RFID", "MFRC522").with_pins([self.reset_bcm]))
    }
}

// ==============================================================================
// LED indicator
// ==============================================================================

/// LED (or relay) on one output pin, active high.
pub struct GpioIndicator {
    pin: Mutex<OutputPin>,
}

impl GpioIndicator {
    pub fn new(bcm: u8) -> Result<Self> {
        tracing::info!(pin = bcm, "Using GPIO indicator");
        Ok(Self {
            pin: Mutex::new(output_pin(bcm)?),
        })
    }

    fn write(&self, level: Level) -> Result<()> {
        let mut pin = self
            .pin
            .lock()
            .map_err(|_| HardwareError::other("indicator pin lock poisoned"))?;
        pin.write(level);
        Ok(())
    }
}

impl Indicator for GpioIndicator {
    fn on(&self) -> Result<()> {
        self.write(Level::High)
    }

    fn off(&self) -> Result<()> {
        self.write(Level::Low)
    }

    fn is_on(&self) -> bool {
        self.pin
            .lock()
            .map(|pin| pin.is_set_high())
            .unwrap_or(false)
    }
}
