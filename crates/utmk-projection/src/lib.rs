//! UTM-K Projection Library
//!
//! Ellipsoidal transverse mercator (Krüger series, 6th order in the third
//! flattening) with the parameters of the Korea Unified Coordinate System,
//! EPSG:5179. Planar coordinates are in meters, geographic coordinates in
//! decimal degrees, always `(longitude, latitude)` order.
//!
//! | Parameter        | UTM-K value       |
//! |------------------|-------------------|
//! | Ellipsoid        | GRS80             |
//! | Origin latitude  | 38°N              |
//! | Central meridian | 127.5°E           |
//! | Scale factor     | 0.9996            |
//! | False easting    | 1 000 000 m       |
//! | False northing   | 2 000 000 m       |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GRS80 semi-major axis in meters
pub const GRS80_SEMI_MAJOR_M: f64 = 6_378_137.0;
/// GRS80 inverse flattening
pub const GRS80_INVERSE_FLATTENING: f64 = 298.257_222_101;

/// Newton iteration limit for the conformal latitude inversion
const MAX_LATITUDE_ITERATIONS: usize = 10;
const LATITUDE_TOLERANCE: f64 = 1e-14;

/// Maximum longitude offset from the central meridian accepted by the series
const MAX_MERIDIAN_OFFSET_DEG: f64 = 90.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Invalid coordinates: lon={lon}, lat={lat}")]
    InvalidCoordinates { lon: f64, lat: f64 },
    #[error("Invalid planar coordinates: x={x}, y={y}")]
    InvalidPlanar { x: f64, y: f64 },
    #[error("Longitude {lon} is too far from central meridian {central}")]
    OutOfZone { lon: f64, central: f64 },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Planar easting/northing in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in meters
    pub fn distance(&self, other: &PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Geographic longitude/latitude in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Projection parameters for a transverse mercator grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransverseMercatorParams {
    pub semi_major_m: f64,
    pub inverse_flattening: f64,
    pub origin_latitude_deg: f64,
    pub central_meridian_deg: f64,
    pub scale_factor: f64,
    pub false_easting_m: f64,
    pub false_northing_m: f64,
}

impl TransverseMercatorParams {
    /// EPSG:5179 (Korea 2000 / Unified CS)
    pub fn utm_k() -> Self {
        Self {
            semi_major_m: GRS80_SEMI_MAJOR_M,
            inverse_flattening: GRS80_INVERSE_FLATTENING,
            origin_latitude_deg: 38.0,
            central_meridian_deg: 127.5,
            scale_factor: 0.9996,
            false_easting_m: 1_000_000.0,
            false_northing_m: 2_000_000.0,
        }
    }
}

/// Transverse mercator projection with precomputed series coefficients.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    params: TransverseMercatorParams,
    eccentricity: f64,
    /// Rectifying radius
    radius_a: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
    /// Rectifying latitude of the origin (radians)
    origin_xi: f64,
}

impl Default for TransverseMercator {
    fn default() -> Self {
        Self::utm_k()
    }
}

impl TransverseMercator {
    pub fn new(params: TransverseMercatorParams) -> Self {
        let f = 1.0 / params.inverse_flattening;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let radius_a = params.semi_major_m / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3 + 41.0 / 180.0 * n4 - 127.0 / 288.0 * n5
                + 7891.0 / 37800.0 * n6,
            13.0 / 48.0 * n2 - 3.0 / 5.0 * n3 + 557.0 / 1440.0 * n4 + 281.0 / 630.0 * n5
                - 1_983_433.0 / 1_935_360.0 * n6,
            61.0 / 240.0 * n3 - 103.0 / 140.0 * n4 + 15061.0 / 26880.0 * n5
                + 167_603.0 / 181_440.0 * n6,
            49561.0 / 161_280.0 * n4 - 179.0 / 168.0 * n5 + 6_601_661.0 / 7_257_600.0 * n6,
            34729.0 / 80640.0 * n5 - 3_418_889.0 / 1_995_840.0 * n6,
            212_378_941.0 / 319_334_400.0 * n6,
        ];

        let beta = [
            n / 2.0 - 2.0 / 3.0 * n2 + 37.0 / 96.0 * n3 - 1.0 / 360.0 * n4 - 81.0 / 512.0 * n5
                + 96199.0 / 604_800.0 * n6,
            n2 / 48.0 + n3 / 15.0 - 437.0 / 1440.0 * n4 + 46.0 / 105.0 * n5
                - 1_118_711.0 / 3_870_720.0 * n6,
            17.0 / 480.0 * n3 - 37.0 / 840.0 * n4 - 209.0 / 4480.0 * n5 + 5569.0 / 90720.0 * n6,
            4397.0 / 161_280.0 * n4 - 11.0 / 504.0 * n5 - 830_251.0 / 7_257_600.0 * n6,
            4583.0 / 161_280.0 * n5 - 108_847.0 / 3_991_680.0 * n6,
            20_648_693.0 / 638_668_800.0 * n6,
        ];

        let eccentricity = (f * (2.0 - f)).sqrt();

        let mut projection = Self {
            params,
            eccentricity,
            radius_a,
            alpha,
            beta,
            origin_xi: 0.0,
        };

        let origin_chi = projection
            .conformal_tau(params.origin_latitude_deg.to_radians().tan())
            .atan();
        projection.origin_xi = origin_chi
            + projection
                .alpha
                .iter()
                .enumerate()
                .map(|(j, a)| a * (2.0 * (j + 1) as f64 * origin_chi).sin())
                .sum::<f64>();

        projection
    }

    /// Korea Unified Coordinate System (EPSG:5179)
    pub fn utm_k() -> Self {
        Self::new(TransverseMercatorParams::utm_k())
    }

    /// Project longitude/latitude (degrees) to easting/northing (meters).
    pub fn forward(&self, point: GeoPoint) -> Result<PlanarPoint> {
        let GeoPoint {
            longitude: lon,
            latitude: lat,
        } = point;

        if !lon.is_finite() || !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ProjectionError::InvalidCoordinates { lon, lat });
        }

        let mut dlon = lon - self.params.central_meridian_deg;
        dlon = (dlon + 540.0).rem_euclid(360.0) - 180.0;
        if dlon.abs() >= MAX_MERIDIAN_OFFSET_DEG {
            return Err(ProjectionError::OutOfZone {
                lon,
                central: self.params.central_meridian_deg,
            });
        }

        let lambda = dlon.to_radians();
        let tau = lat.to_radians().tan();
        let tau_prime = self.conformal_tau(tau);

        let xi_prime = tau_prime.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / tau_prime.hypot(lambda.cos())).asinh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += a * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += a * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let k0 = self.params.scale_factor;
        Ok(PlanarPoint {
            x: self.params.false_easting_m + k0 * self.radius_a * eta,
            y: self.params.false_northing_m + k0 * self.radius_a * (xi - self.origin_xi),
        })
    }

    /// Unproject easting/northing (meters) back to longitude/latitude (degrees).
    pub fn inverse(&self, point: PlanarPoint) -> Result<GeoPoint> {
        let PlanarPoint { x, y } = point;
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::InvalidPlanar { x, y });
        }

        let k0a = self.params.scale_factor * self.radius_a;
        let eta = (x - self.params.false_easting_m) / k0a;
        let xi = (y - self.params.false_northing_m) / k0a + self.origin_xi;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_prime -= b * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let tau_prime = xi_prime.sin() / eta_prime.sinh().hypot(xi_prime.cos());
        let lambda = eta_prime.sinh().atan2(xi_prime.cos());
        let tau = self.geodetic_tau(tau_prime);

        Ok(GeoPoint {
            longitude: self.params.central_meridian_deg + lambda.to_degrees(),
            latitude: tau.atan().to_degrees(),
        })
    }

    /// tan(conformal latitude) from tan(geodetic latitude)
    fn conformal_tau(&self, tau: f64) -> f64 {
        let e = self.eccentricity;
        let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
        tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt()
    }

    /// tan(geodetic latitude) from tan(conformal latitude), by Newton's method
    fn geodetic_tau(&self, tau_prime: f64) -> f64 {
        let e2 = self.eccentricity * self.eccentricity;
        let mut tau = tau_prime;
        for _ in 0..MAX_LATITUDE_ITERATIONS {
            let tau_i = self.conformal_tau(tau);
            let delta = (tau_prime - tau_i) / (1.0 + tau_i * tau_i).sqrt()
                * (1.0 + (1.0 - e2) * tau * tau)
                / ((1.0 - e2) * (1.0 + tau * tau).sqrt());
            tau += delta;
            if delta.abs() <= LATITUDE_TOLERANCE * tau.abs().max(1.0) {
                break;
            }
        }
        tau
    }
}
