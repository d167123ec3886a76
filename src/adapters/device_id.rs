//! Device identity derived from the factory-programmed MAC address.
//!
//! Used for the broker client id, which must be unique per device on the
//! mesh or the broker will keep kicking the twins off each other.

use core::fmt::Write as _;

/// Base MAC from eFuse. A fixed placeholder on host targets.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> [u8; 6] {
    let mut mac = [0u8; 6];
    // SAFETY: esp_read_mac writes exactly 6 bytes for WIFI_STA.
    unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        );
    }
    mac
}

#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> [u8; 6] {
    [0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC]
}

/// Broker client id: `campernode-<last three MAC octets>`.
pub fn client_id(mac: &[u8; 6]) -> heapless::String<48> {
    let mut id = heapless::String::new();
    let _ = write!(
        id,
        "campernode-{:02x}{:02x}{:02x}",
        mac[3], mac[4], mac[5]
    );
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_uses_mac_tail() {
        let id = client_id(&[0x24, 0x6F, 0x28, 0x01, 0x02, 0x03]);
        assert_eq!(id.as_str(), "campernode-010203");
    }
}
