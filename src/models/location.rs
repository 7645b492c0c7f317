use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryType {
    #[default]
    Point,
}

/// GeoJSON point. Coordinates are `[longitude, latitude]`, the layout MongoDB's
/// `2dsphere` index expects.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub geometry_type: GeometryType,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            geometry_type: GeometryType::Point,
            coordinates: [longitude, latitude],
        }
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn validate(&self) -> Result<(), String> {
        let (lat, lng) = (self.latitude(), self.longitude());
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {} is out of range", lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(format!("longitude {} is out of range", lng));
        }
        Ok(())
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1_rad = self.latitude().to_radians();
        let lat2_rad = other.latitude().to_radians();
        let delta_lat = (other.latitude() - self.latitude()).to_radians();
        let delta_lon = (other.longitude() - self.longitude()).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: GeoPoint,
    pub properties: FeatureProperties,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeatureProperties {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub day: u32,
    pub order: u32,
    pub notes: String,
}

impl Feature {
    pub fn point(geometry: GeoPoint, properties: FeatureProperties) -> Self {
        Self {
            feature_type: "Feature".to_string(),
            geometry,
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geojson_coordinate_order() {
        let point = GeoPoint::new(28.7569, -17.8847);
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"][0], -17.8847);
        assert_eq!(json["coordinates"][1], 28.7569);
    }

    #[test]
    fn test_distance_km() {
        // Santa Cruz de La Palma to Roque de los Muchachos is roughly 14 km as the crow flies.
        let santa_cruz = GeoPoint::new(28.6835, -17.7642);
        let roque = GeoPoint::new(28.7542, -17.8852);
        let distance = santa_cruz.distance_km(&roque);
        assert!(distance > 13.0 && distance < 15.0, "got {}", distance);
        assert_eq!(santa_cruz.distance_km(&santa_cruz), 0.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).validate().is_err());
        assert!(GeoPoint::new(0.0, -181.0).validate().is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).validate().is_err());
        assert!(GeoPoint::new(28.7, -17.9).validate().is_ok());
    }
}
