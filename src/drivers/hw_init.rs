//! One-shot hardware peripheral initialization.
//!
//! Configures ADC channels, GPIO directions, and LEDC timers/channels
//! using raw ESP-IDF sys calls. Called once from `main()` before the
//! tick loop starts. All helpers have host-target fallbacks so the pure
//! logic builds and tests off-device.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed,
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed => write!(f, "LEDC timer/channel config failed"),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the tick loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_ledc();
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path. No concurrent access is possible because
/// `init_adc()` completes before the tick loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    let mut channels: heapless::Vec<u32, 8> = heapless::Vec::new();
    channels.extend(pins::HEATING_NTC_ADC_CHANNELS);
    let _ = channels.push(pins::LEVEL_PITCH_ADC_CHANNEL);
    let _ = channels.push(pins::LEVEL_ROLL_ADC_CHANNEL);

    for channel in channels {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!("hw_init: ADC1 configured (NTC x4, tilt x2)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract — single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.max(0) as u16
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> u16 {
    0
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let input_pins = [
        pins::LIGHT_BUTTON_GPIOS[0],
        pins::LIGHT_BUTTON_GPIOS[1],
        pins::LIFT_BUTTON_UP_GPIO,
        pins::LIFT_BUTTON_DOWN_GPIO,
    ];

    for &pin in &input_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    // Water probes boot floating; probe_begin()/probe_release() switch the
    // mode around each exclusive sample.
    for &pin in &pins::WATER_PROBE_GPIOS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let mut output_pins: heapless::Vec<i32, 8> = heapless::Vec::new();
    output_pins.extend(pins::HEATING_RELAY_GPIOS);
    let _ = output_pins.push(pins::LIFT_UP_RELAY_GPIO);
    let _ = output_pins.push(pins::LIFT_DOWN_RELAY_GPIO);

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured (all relays open)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_gpio_outputs(). Main-loop only.
    unsafe {
        gpio_set_level(pin, if high { 1 } else { 0 });
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── Probe sampling (exclusive pin access) ─────────────────────
//
// Resistive level probes share a ground rail; a probe pin carries current
// only while pulled up. One physical operation per pin at a time, and the
// pin returns to a low-current floating input immediately after sampling.

#[cfg(target_os = "espidf")]
pub fn probe_begin(pin: i32) {
    // SAFETY: mode/pull changes on an input pin from the main loop only.
    unsafe {
        gpio_set_pull_mode(pin, gpio_pull_mode_t_GPIO_PULLUP_ONLY);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn probe_begin(_pin: i32) {}

#[cfg(target_os = "espidf")]
pub fn probe_release(pin: i32) {
    // SAFETY: see probe_begin.
    unsafe {
        gpio_set_pull_mode(pin, gpio_pull_mode_t_GPIO_FLOATING);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn probe_release(_pin: i32) {}

/// Short bounded busy-wait for pull-up stabilisation. The only blocking
/// delay in the tick path, a few milliseconds per probe.
#[cfg(target_os = "espidf")]
pub fn settle_delay_ms(ms: u32) {
    // SAFETY: esp_rom_delay_us is a calibrated busy-wait, safe anywhere.
    unsafe {
        esp_rom_delay_us(ms * 1_000);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn settle_delay_ms(_ms: u32) {}

// ── LEDC PWM ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() {
    // Timer 0: all light strips (19.5 kHz, 8-bit).
    // SAFETY: Called from single main-task context via init_peripherals().
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::LIGHT_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    unsafe {
        ledc_timer_config(&timer0);
    }

    let strip_channels = [
        (pins::LIGHT_MONO_LEDC_CH, pins::LIGHT_MONO_GPIO),
        (pins::LIGHT_RGB_LEDC_CH[0], pins::LIGHT_RGB_GPIOS[0]),
        (pins::LIGHT_RGB_LEDC_CH[1], pins::LIGHT_RGB_GPIOS[1]),
        (pins::LIGHT_RGB_LEDC_CH[2], pins::LIGHT_RGB_GPIOS[2]),
    ];
    for (channel, gpio) in strip_channels {
        unsafe {
            ledc_channel_config(&ledc_channel_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel,
                timer_sel: ledc_timer_t_LEDC_TIMER_0,
                gpio_num: gpio,
                duty: 0,
                hpoint: 0,
                ..Default::default()
            });
        }
    }

    info!("hw_init: LEDC configured (mono=CH0, rgb=CH1-3)");
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: LEDC channels were configured in init_ledc(); duty register
    // writes are race-free since only the main loop calls this function.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty as u32);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}
