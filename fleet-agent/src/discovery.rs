//! Device identification for the fleet agent
//!
//! The identifier reported to the kernel is the primary MAC address
//! (`AA:BB:CC:DD:EE:FF`), chosen with priority Ethernet > WiFi > Other.
//! A configured identifier replaces discovery entirely.

use anyhow::{Context, Result};
use if_addrs::get_if_addrs;
use tracing::{debug, info, warn};

/// Interface type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    Ethernet,
    Wireless,
    Loopback,
    Other,
}

/// A non-loopback interface with a hardware address.
#[derive(Debug, Clone)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: String,
    pub interface_type: InterfaceType,
}

/// Resolves the identifier this agent reports under.
pub fn resolve_identifier(configured: Option<&str>) -> Result<String> {
    if let Some(id) = configured.map(str::trim).filter(|id| !id.is_empty()) {
        info!("Using configured identifier: {}", id);
        return Ok(id.to_string());
    }

    let interfaces = discover_interfaces()?;
    select_primary_mac(&interfaces)
}

/// Enumerates network interfaces that expose a MAC address.
pub fn discover_interfaces() -> Result<Vec<NetworkInterface>> {
    debug!("Enumerating network interfaces...");

    let if_addrs = get_if_addrs().context("Failed to enumerate network interfaces")?;

    let mut interfaces: Vec<NetworkInterface> = Vec::new();
    for if_addr in if_addrs {
        if if_addr.is_loopback() {
            continue;
        }
        // one entry per interface even when it carries both v4 and v6
        if interfaces.iter().any(|i| i.name == if_addr.name) {
            continue;
        }

        match mac_address::mac_address_by_name(&if_addr.name) {
            Ok(Some(mac)) => {
                let interface = NetworkInterface {
                    interface_type: classify_interface(&if_addr.name),
                    mac: mac.to_string().to_uppercase(),
                    name: if_addr.name,
                };
                debug!("Found interface: {} ({})", interface.name, interface.mac);
                interfaces.push(interface);
            }
            Ok(None) => debug!("No MAC found for interface: {}", if_addr.name),
            Err(e) => debug!("Error getting MAC for {}: {}", if_addr.name, e),
        }
    }

    Ok(interfaces)
}

/// Classify interface type based on name patterns
pub fn classify_interface(name: &str) -> InterfaceType {
    let name_lower = name.to_lowercase();

    if name_lower == "lo" || name_lower.starts_with("lo0") || name_lower.contains("loopback") {
        return InterfaceType::Loopback;
    }

    if name_lower.contains("wlan") || name_lower.contains("wifi") ||
       name_lower.contains("wlp") || name_lower.contains("wlo") {
        return InterfaceType::Wireless;
    }

    if name_lower.starts_with("eth") || name_lower.starts_with("en") {
        return InterfaceType::Ethernet;
    }

    InterfaceType::Other
}

/// Select primary MAC address based on interface priority
pub fn select_primary_mac(interfaces: &[NetworkInterface]) -> Result<String> {
    let by_type = |wanted: InterfaceType| interfaces.iter().find(|i| i.interface_type == wanted);

    if let Some(interface) = by_type(InterfaceType::Ethernet) {
        info!("Selected Ethernet interface as primary: {}", interface.name);
        return Ok(interface.mac.clone());
    }

    if let Some(interface) = by_type(InterfaceType::Wireless) {
        info!("Selected WiFi interface as primary: {}", interface.name);
        return Ok(interface.mac.clone());
    }

    if let Some(interface) = interfaces.first() {
        warn!("No Ethernet/WiFi found, using first interface: {}", interface.name);
        return Ok(interface.mac.clone());
    }

    Err(anyhow::anyhow!("No network interface with a MAC address found; set `identifier` in the config"))
}
