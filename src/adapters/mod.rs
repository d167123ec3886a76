//! Adapters — concrete implementations of the port traits plus small
//! platform services.
//!
//! | Adapter     | Implements    | Connects to             |
//! |-------------|---------------|-------------------------|
//! | `nvs`       | StoragePort   | NVS / in-memory store   |
//! | `time`      | —             | ESP32 system timer      |
//! | `device_id` | —             | eFuse MAC               |

pub mod device_id;
pub mod nvs;
pub mod time;
