//! GPIO / peripheral pin assignments for the CamperNode main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers. Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Water level probe bank (resistive probes, shared ground rail)
// ---------------------------------------------------------------------------

/// Probe pins from tank bottom to top. Each is sampled exclusively:
/// pull-up input → settle → read → floating input.
pub const WATER_PROBE_GPIOS: [i32; 5] = [4, 5, 6, 7, 15];
/// Pull-up stabilisation time before a probe read (bounded blocking wait).
pub const WATER_PROBE_SETTLE_MS: u32 = 2;

// ---------------------------------------------------------------------------
// Floor heating (4 circles: NTC sensor + relay each)
// ---------------------------------------------------------------------------

/// ADC1 channels for the per-circle NTC dividers.
pub const HEATING_NTC_ADC_CHANNELS: [u32; 4] = [0, 1, 2, 3];
/// Relay driver outputs (active HIGH through opto-isolated relay board).
pub const HEATING_RELAY_GPIOS: [i32; 4] = [16, 17, 18, 8];

// ---------------------------------------------------------------------------
// LED strips (12 V analog strips via MOSFET, LEDC PWM)
// ---------------------------------------------------------------------------

/// Channel 0: monochrome ceiling strip.
pub const LIGHT_MONO_LEDC_CH: u32 = 0;
pub const LIGHT_MONO_GPIO: i32 = 21;
/// Channel 1: RGB accent strip (three LEDC channels).
pub const LIGHT_RGB_LEDC_CH: [u32; 3] = [1, 2, 3];
pub const LIGHT_RGB_GPIOS: [i32; 3] = [38, 39, 40];
/// Wall buttons, one per light channel (active-low, external pull-up).
pub const LIGHT_BUTTON_GPIOS: [i32; 2] = [35, 36];

/// LEDC timer resolution (bits). 8-bit gives 0 – 255 duty levels.
pub const LIGHT_PWM_RESOLUTION_BITS: u32 = 8;
/// LEDC base frequency for the strips (19.5 kHz — inaudible, flicker-free).
pub const LIGHT_PWM_FREQ_HZ: u32 = 19_500;

// ---------------------------------------------------------------------------
// Table lift / damper motor
// ---------------------------------------------------------------------------

/// Relay pair driving the motor; never both HIGH.
pub const LIFT_UP_RELAY_GPIO: i32 = 9;
pub const LIFT_DOWN_RELAY_GPIO: i32 = 10;
/// Up / down momentary buttons (active-low, external pull-up).
pub const LIFT_BUTTON_UP_GPIO: i32 = 11;
pub const LIFT_BUTTON_DOWN_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Leveling (two-axis analog inclinometer)
// ---------------------------------------------------------------------------

/// ADC1 channels: pitch (front/back), roll (left/right).
pub const LEVEL_PITCH_ADC_CHANNEL: u32 = 4;
pub const LEVEL_ROLL_ADC_CHANNEL: u32 = 5;

// ---------------------------------------------------------------------------
// Climate (DHT22 combined temperature/humidity)
// ---------------------------------------------------------------------------

pub const DHT_DATA_GPIO: i32 = 13;
