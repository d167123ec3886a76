//! Two-axis analog inclinometer for the leveling module.
//!
//! Each axis is a ratiometric voltage centred at half scale; the linear
//! degrees-per-count factor covers roughly ±40 degrees over the 12-bit
//! range. Zero-offset calibration is the leveling module's job — this
//! driver reports raw geometry only.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::pins;

static SIM_PITCH_ADC: AtomicU16 = AtomicU16::new(2048);
static SIM_ROLL_ADC: AtomicU16 = AtomicU16::new(2048);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_raw(pitch_adc: u16, roll_adc: u16) {
    SIM_PITCH_ADC.store(pitch_adc, Ordering::Relaxed);
    SIM_ROLL_ADC.store(roll_adc, Ordering::Relaxed);
}

/// Serialises tests that script the shared sim statics.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

const MID_SCALE: f32 = 2048.0;
const DEG_PER_COUNT: f32 = 0.02;

#[derive(Debug, Clone, Copy)]
pub struct TiltReading {
    pub pitch_deg: f32,
    pub roll_deg: f32,
}

pub struct TiltSensor {
    _pitch_channel: u32,
    _roll_channel: u32,
}

impl TiltSensor {
    pub fn new() -> Self {
        Self {
            _pitch_channel: pins::LEVEL_PITCH_ADC_CHANNEL,
            _roll_channel: pins::LEVEL_ROLL_ADC_CHANNEL,
        }
    }

    pub fn read(&self) -> TiltReading {
        let (pitch_raw, roll_raw) = self.read_adc_pair();
        TiltReading {
            pitch_deg: (pitch_raw as f32 - MID_SCALE) * DEG_PER_COUNT,
            roll_deg: (roll_raw as f32 - MID_SCALE) * DEG_PER_COUNT,
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_adc_pair(&self) -> (u16, u16) {
        (
            hw_init::adc1_read(self._pitch_channel),
            hw_init::adc1_read(self._roll_channel),
        )
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc_pair(&self) -> (u16, u16) {
        (
            SIM_PITCH_ADC.load(Ordering::Relaxed),
            SIM_ROLL_ADC.load(Ordering::Relaxed),
        )
    }
}

impl Default for TiltSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_at_midscale_and_sign_convention() {
        let _lock = TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let sensor = TiltSensor::new();

        sim_set_raw(2048, 2048);
        let r = sensor.read();
        assert!(r.pitch_deg.abs() < 0.01);
        assert!(r.roll_deg.abs() < 0.01);

        // Nose-up pitch raises the count.
        sim_set_raw(2148, 1948);
        let r = sensor.read();
        assert!((r.pitch_deg - 2.0).abs() < 0.01);
        assert!((r.roll_deg + 2.0).abs() < 0.01);
    }
}
