//! DHT22 combined temperature/humidity sensor.
//!
//! Single-wire protocol bit-banged on one GPIO: the host pulls the line
//! low for ~1 ms, the sensor answers with 40 timed bits. The whole
//! transaction is a bounded busy-wait well under 6 ms.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: real protocol via raw GPIO + calibrated delays.
//! On host/test: reads from static atomics for injection.

use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU16};
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use crate::error::SensorError;

static SIM_TEMP_C_X10: AtomicI16 = AtomicI16::new(215);
static SIM_HUM_RH_X10: AtomicU16 = AtomicU16::new(450);
static SIM_FAIL: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_reading(temp_c: f32, hum_rh: f32) {
    SIM_TEMP_C_X10.store((temp_c * 10.0) as i16, Ordering::Relaxed);
    SIM_HUM_RH_X10.store((hum_rh * 10.0) as u16, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_fail(fail: bool) {
    SIM_FAIL.store(fail, Ordering::Relaxed);
}

/// Serialises tests that script the shared sim statics.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Physically plausible envelope for the DHT22.
const MIN_TEMP_C: f32 = -40.0;
const MAX_TEMP_C: f32 = 80.0;
const MAX_HUM_RH: f32 = 100.0;

#[derive(Debug, Clone, Copy)]
pub struct DhtReading {
    pub temperature_c: f32,
    pub humidity_rh: f32,
}

pub struct DhtSensor {
    gpio: i32,
}

impl DhtSensor {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    /// One transaction. Checksum failures, bus timeouts, and out-of-range
    /// values are typed errors; the caller retains its last valid reading.
    pub fn read(&mut self) -> Result<DhtReading, SensorError> {
        let frame = self.read_frame()?;

        let checksum = frame[0]
            .wrapping_add(frame[1])
            .wrapping_add(frame[2])
            .wrapping_add(frame[3]);
        if checksum != frame[4] {
            return Err(SensorError::SentinelValue);
        }

        let hum_raw = u16::from_be_bytes([frame[0], frame[1]]);
        let temp_raw = u16::from_be_bytes([frame[2], frame[3]]);
        let humidity_rh = hum_raw as f32 / 10.0;
        // Sign bit lives in the top bit of the temperature word.
        let temperature_c = if temp_raw & 0x8000 != 0 {
            -((temp_raw & 0x7FFF) as f32 / 10.0)
        } else {
            temp_raw as f32 / 10.0
        };

        if !(MIN_TEMP_C..=MAX_TEMP_C).contains(&temperature_c)
            || !(0.0..=MAX_HUM_RH).contains(&humidity_rh)
        {
            return Err(SensorError::OutOfRange);
        }

        Ok(DhtReading {
            temperature_c,
            humidity_rh,
        })
    }

    #[cfg(target_os = "espidf")]
    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        use esp_idf_svc::sys::*;

        let pin = self.gpio;

        // SAFETY: single main-loop caller; the pin is dedicated to this
        // sensor and reconfigured around every transaction.
        unsafe {
            gpio_set_direction(pin, gpio_mode_t_GPIO_MODE_OUTPUT_OD);
            gpio_set_level(pin, 0);
            esp_rom_delay_us(1_100); // host start signal
            gpio_set_level(pin, 1);
            esp_rom_delay_us(30);
            gpio_set_direction(pin, gpio_mode_t_GPIO_MODE_INPUT);
        }

        // Sensor response: ~80us low, ~80us high.
        wait_for_level(pin, false, 100)?;
        wait_for_level(pin, true, 100)?;
        wait_for_level(pin, false, 100)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            // 50us low preamble, then 26-28us high = 0, ~70us high = 1.
            wait_for_level(pin, true, 80)?;
            let high_us = measure_high_us(pin, 100)?;
            if high_us > 45 {
                frame[bit / 8] |= 1 << (7 - (bit % 8));
            }
        }
        Ok(frame)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        if SIM_FAIL.load(Ordering::Relaxed) {
            return Err(SensorError::NoResponse);
        }
        let temp = SIM_TEMP_C_X10.load(Ordering::Relaxed);
        let hum = SIM_HUM_RH_X10.load(Ordering::Relaxed);
        let temp_word = if temp < 0 {
            (temp.unsigned_abs()) | 0x8000
        } else {
            temp as u16
        };
        let [h0, h1] = hum.to_be_bytes();
        let [t0, t1] = temp_word.to_be_bytes();
        let checksum = h0.wrapping_add(h1).wrapping_add(t0).wrapping_add(t1);
        Ok([h0, h1, t0, t1, checksum])
    }
}

/// Busy-wait until the line reaches `level`, with a microsecond cap.
#[cfg(target_os = "espidf")]
fn wait_for_level(pin: i32, level: bool, timeout_us: u32) -> Result<(), SensorError> {
    use esp_idf_svc::sys::*;
    for _ in 0..timeout_us {
        // SAFETY: register read on a configured input pin.
        if (unsafe { gpio_get_level(pin) } != 0) == level {
            return Ok(());
        }
        // SAFETY: calibrated busy-wait.
        unsafe { esp_rom_delay_us(1) };
    }
    Err(SensorError::NoResponse)
}

/// Measure how long the line stays high, with a microsecond cap.
#[cfg(target_os = "espidf")]
fn measure_high_us(pin: i32, timeout_us: u32) -> Result<u32, SensorError> {
    use esp_idf_svc::sys::*;
    for elapsed in 0..timeout_us {
        // SAFETY: as wait_for_level.
        if unsafe { gpio_get_level(pin) } == 0 {
            return Ok(elapsed);
        }
        unsafe { esp_rom_delay_us(1) };
    }
    Err(SensorError::NoResponse)
}
