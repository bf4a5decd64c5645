use crate::error::{AppError, Result};
use crate::models::coordinate::CoordinateIngest;

/// Validates a coordinate payload before it reaches the directory.
///
/// Latitude must be within [-90, 90] and longitude within [-180, 180];
/// accuracy and speed, when present, must be non-negative. Timestamps are
/// client-supplied metadata and are deliberately not checked.
pub fn validate_coordinate(coordinate: &CoordinateIngest) -> Result<()> {
    if !(-90.0..=90.0).contains(&coordinate.latitude) {
        return Err(AppError::Validation(
            "Latitude must be between -90 and 90".to_string(),
        ));
    }

    if !(-180.0..=180.0).contains(&coordinate.longitude) {
        return Err(AppError::Validation(
            "Longitude must be between -180 and 180".to_string(),
        ));
    }

    if let Some(accuracy) = coordinate.accuracy {
        if accuracy < 0.0 {
            return Err(AppError::Validation(
                "Accuracy must be non-negative".to_string(),
            ));
        }
    }

    if let Some(speed) = coordinate.speed {
        if speed < 0.0 {
            return Err(AppError::Validation(
                "Speed must be non-negative".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates a device identifier.
pub fn validate_device_id(device_id: &str) -> Result<()> {
    if device_id.trim().is_empty() {
        return Err(AppError::Validation("Device ID is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest(lat: f64, lng: f64) -> CoordinateIngest {
        CoordinateIngest {
            latitude: lat,
            longitude: lng,
            timestamp: None,
            accuracy: None,
            speed: None,
            tag: None,
        }
    }

    #[test]
    fn accepts_coordinates_in_range() {
        assert!(validate_coordinate(&ingest(28.1, 77.2)).is_ok());
        assert!(validate_coordinate(&ingest(-90.0, 180.0)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(validate_coordinate(&ingest(90.5, 0.0)).is_err());
        assert!(validate_coordinate(&ingest(0.0, -180.5)).is_err());
    }

    #[test]
    fn rejects_negative_accuracy_and_speed() {
        let mut c = ingest(0.0, 0.0);
        c.accuracy = Some(-1.0);
        assert!(validate_coordinate(&c).is_err());

        let mut c = ingest(0.0, 0.0);
        c.speed = Some(-0.1);
        assert!(validate_coordinate(&c).is_err());
    }

    #[test]
    fn rejects_blank_device_id() {
        assert!(validate_device_id("  ").is_err());
        assert!(validate_device_id("D1").is_ok());
    }
}
