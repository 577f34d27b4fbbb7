//! Coarse (lat, lng) to country mapping.
//!
//! Rectangular bounding boxes checked in table order; first hit wins. This is
//! an approximation for seeding the initial view, not real geocoding.

use serde::Serialize;

use crate::catalog::{ContinentId, GeoCatalog};

/// (code, min_lat, max_lat, min_lng, max_lng)
type BoundingBox = (&'static str, f64, f64, f64, f64);

// Smaller or overlapping countries come before the larger boxes they sit in.
const COUNTRY_BOXES: &[BoundingBox] = &[
    ("SG", 1.15, 1.48, 103.6, 104.1),
    ("AE", 22.6, 26.1, 51.5, 56.4),
    ("IN", 6.5, 35.5, 68.1, 97.4),
    ("JP", 24.0, 45.6, 122.9, 146.0),
    ("CN", 18.0, 53.6, 73.5, 135.1),
    ("GB", 49.9, 60.9, -8.2, 1.8),
    ("FR", 41.3, 51.1, -5.2, 9.6),
    ("DE", 47.3, 55.1, 5.9, 15.0),
    ("ES", 36.0, 43.8, -9.3, 3.3),
    ("US", 24.5, 49.4, -124.8, -66.9),
    ("CA", 41.7, 83.1, -141.0, -52.6),
    ("MX", 14.5, 32.7, -118.4, -86.7),
    ("BR", -33.8, 5.3, -74.0, -34.8),
    ("CL", -56.0, -17.5, -75.7, -66.4),
    ("AR", -55.1, -21.8, -73.6, -53.6),
    ("NG", 4.3, 13.9, 2.7, 14.7),
    ("KE", -4.7, 5.0, 33.9, 41.9),
    ("EG", 22.0, 31.7, 24.7, 36.9),
    ("ZA", -34.8, -22.1, 16.5, 32.9),
    ("AU", -43.6, -10.7, 113.3, 153.6),
    ("NZ", -47.3, -34.4, 166.4, 178.6),
];

/// Country and continent a coordinate falls in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub country_code: String,
    pub country_id: String,
    pub country_name: String,
    pub continent: ContinentId,
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinateResolver<'a> {
    catalog: &'a GeoCatalog,
}

impl<'a> CoordinateResolver<'a> {
    pub fn new(catalog: &'a GeoCatalog) -> Self {
        Self { catalog }
    }

    /// Returns `None` when no box matches; callers fall back to the world view.
    pub fn resolve(&self, lat: f64, lng: f64) -> Option<ResolvedLocation> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }

        COUNTRY_BOXES
            .iter()
            .filter(|(_, min_lat, max_lat, min_lng, max_lng)| {
                (*min_lat..=*max_lat).contains(&lat) && (*min_lng..=*max_lng).contains(&lng)
            })
            // Boxes for countries missing from this catalog are skipped.
            .find_map(|(code, ..)| {
                let country = self.catalog.country_by_code(code)?;
                let continent = self.catalog.continent_for_code(code)?;
                Some(ResolvedLocation {
                    country_code: country.code_key(),
                    country_id: country.id.clone(),
                    country_name: country.name.clone(),
                    continent,
                })
            })
    }
}
