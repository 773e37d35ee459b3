//! Camera device enumeration.

use nokhwa::query;
use nokhwa::utils::ApiBackend;

use super::types::{CameraInfo, CaptureError};

/// List all available camera devices on the system.
///
/// Returns a vector of `CameraInfo` structs, or an error if querying fails.
/// If no cameras are found, returns an empty vector (not an error).
pub fn list_devices() -> Result<Vec<CameraInfo>, CaptureError> {
    let devices = query(ApiBackend::Auto).map_err(|e| CaptureError::QueryFailed(e.to_string()))?;

    Ok(devices
        .into_iter()
        .map(|d| CameraInfo {
            index: d.index().as_index().unwrap_or(0),
            name: d.human_name(),
            description: d.description().to_string(),
        })
        .collect())
}

/// Look up one device by index.
///
/// # Errors
/// * `CaptureError::NoDevices` - no cameras at all
/// * `CaptureError::DeviceNotFound` - cameras exist, but not this index
pub fn find_device(index: u32) -> Result<CameraInfo, CaptureError> {
    let devices = list_devices()?;
    if devices.is_empty() {
        return Err(CaptureError::NoDevices);
    }
    devices
        .into_iter()
        .find(|d| d.index == index)
        .ok_or(CaptureError::DeviceNotFound(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices_does_not_error() {
        // Should not error even if no cameras are present
        // (returns empty list instead)
        let result = list_devices();
        assert!(result.is_ok());
    }

    #[test]
    fn test_find_device_unlikely_index_errors() {
        let result = find_device(4_000_000);
        assert!(result.is_err());
    }
}
