//! NTC thermistor floor sensors (10 kOhm @ 25 C, B = 3950).
//!
//! One thermistor per heating circle, each in a voltage-divider with a
//! fixed 10 kOhm resistor read via the ESP32 ADC. The simplified Beta
//! (Steinhart-Hart) equation converts resistance to temperature.
//!
//! Rail-stuck raw values (0 / 4095) mean an open or shorted divider and
//! are reported as sentinel errors rather than temperatures.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;
use crate::pins;

static SIM_NTC_ADC: [AtomicU16; 4] = [
    AtomicU16::new(2048),
    AtomicU16::new(2048),
    AtomicU16::new(2048),
    AtomicU16::new(2048),
];

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_circle_adc(circle: usize, raw: u16) {
    SIM_NTC_ADC[circle].store(raw, Ordering::Relaxed);
}

/// Serialises tests that script the shared sim statics.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// Plausible floor-temperature envelope. Anything outside is discarded.
const MIN_PLAUSIBLE_C: f32 = -30.0;
const MAX_PLAUSIBLE_C: f32 = 90.0;

pub struct NtcSensor {
    circle: usize,
    _adc_channel: u32,
}

impl NtcSensor {
    pub fn new(circle: usize) -> Self {
        Self {
            circle,
            _adc_channel: pins::HEATING_NTC_ADC_CHANNELS[circle],
        }
    }

    /// Read and convert one sample. Sentinel or implausible values are
    /// typed errors; the caller keeps its last valid reading.
    pub fn read(&self) -> Result<f32, SensorError> {
        let raw = self.read_adc();
        if raw == 0 || raw >= 4095 {
            return Err(SensorError::SentinelValue);
        }
        let celsius = adc_to_celsius(raw);
        if !(MIN_PLAUSIBLE_C..=MAX_PLAUSIBLE_C).contains(&celsius) {
            return Err(SensorError::OutOfRange);
        }
        Ok(celsius)
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(self._adc_channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_NTC_ADC[self.circle].load(Ordering::Relaxed)
    }
}

fn adc_to_celsius(raw: u16) -> f32 {
    let voltage = (raw as f32 / ADC_MAX) * V_REF;
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    (1.0 / inv_t) - 273.15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midscale_reads_room_temperature() {
        let _lock = TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sim_set_circle_adc(0, 2048);
        let t = NtcSensor::new(0).read().unwrap();
        assert!((t - 25.0).abs() < 1.0, "got {t}");
    }

    #[test]
    fn rail_low_is_sentinel() {
        let _lock = TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sim_set_circle_adc(1, 0);
        assert_eq!(NtcSensor::new(1).read(), Err(SensorError::SentinelValue));
    }

    #[test]
    fn rail_high_is_sentinel() {
        let _lock = TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sim_set_circle_adc(2, 4095);
        assert_eq!(NtcSensor::new(2).read(), Err(SensorError::SentinelValue));
    }

    #[test]
    fn higher_adc_means_colder() {
        let _lock = TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // More divider voltage ⇒ larger NTC resistance ⇒ lower temperature.
        sim_set_circle_adc(3, 3000);
        let cold = NtcSensor::new(3).read().unwrap();
        sim_set_circle_adc(3, 1000);
        let warm = NtcSensor::new(3).read().unwrap();
        assert!(cold < warm);
    }
}
