//! Local horizon profile.
//!
//! RTS2 describes site obstructions as a text file of `az alt` pairs after a
//! three-line header. The profile is padded to cover the full 0..360 azimuth
//! range, clamped from below at the configured minimum altitude and linearly
//! interpolated in between.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use qtty::Degrees;

use crate::api::AltAz;

const HEADER_LINES: usize = 3;

/// Minimum observable altitude as a function of azimuth.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonProfile {
    /// (azimuth, altitude) nodes sorted by azimuth, spanning 0..=360
    points: Vec<(f64, f64)>,
    min_altitude: Degrees,
}

impl HorizonProfile {
    /// A flat horizon at `min_altitude`.
    pub fn flat(min_altitude: Degrees) -> Self {
        Self {
            points: Vec::new(),
            min_altitude,
        }
    }

    /// Build a profile from `(azimuth, altitude)` nodes.
    pub fn from_points(mut points: Vec<(f64, f64)>, min_altitude: Degrees) -> Self {
        if points.is_empty() {
            return Self::flat(min_altitude);
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        if let Some(&(az, alt)) = points.first() {
            if az > 0.0 {
                points.insert(0, (0.0, alt));
            }
        }
        if let Some(&(az, alt)) = points.last() {
            if az < 360.0 {
                points.push((360.0, alt));
            }
        }
        for point in &mut points {
            point.1 = point.1.max(min_altitude.value());
        }

        Self {
            points,
            min_altitude,
        }
    }

    /// Parse the contents of an RTS2 horizon file.
    pub fn parse(content: &str, min_altitude: Degrees) -> Result<Self> {
        let mut points = Vec::new();
        for (lineno, line) in content.lines().enumerate().skip(HEADER_LINES) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(az), Some(alt)) = (parts.next(), parts.next()) else {
                bail!("horizon line {}: expected 'az alt'", lineno + 1);
            };
            let az: f64 = az
                .parse()
                .with_context(|| format!("horizon line {}: bad azimuth '{}'", lineno + 1, az))?;
            let alt: f64 = alt
                .parse()
                .with_context(|| format!("horizon line {}: bad altitude '{}'", lineno + 1, alt))?;
            points.push((az, alt));
        }
        Ok(Self::from_points(points, min_altitude))
    }

    /// Load a horizon file, falling back to a flat horizon when it does not exist.
    pub fn load(path: &Path, min_altitude: Degrees) -> Result<Self> {
        if !path.exists() {
            info!(
                "Horizon file {} not found, using flat horizon at {} deg",
                path.display(),
                min_altitude.value()
            );
            return Ok(Self::flat(min_altitude));
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read horizon file {}", path.display()))?;
        let profile = Self::parse(&content, min_altitude)?;
        debug!(
            "Loaded horizon profile with {} nodes from {}",
            profile.points.len(),
            path.display()
        );
        Ok(profile)
    }

    pub fn min_altitude(&self) -> Degrees {
        self.min_altitude
    }

    /// Lowest observable altitude towards `azimuth`.
    pub fn altitude_at(&self, azimuth: Degrees) -> Degrees {
        let az = azimuth.value().rem_euclid(360.0);
        let Some(idx) = self.points.iter().position(|&(node_az, _)| node_az >= az) else {
            return self.min_altitude;
        };
        let (az1, alt1) = self.points[idx];
        if idx == 0 || az1 == az {
            return Degrees::new(alt1);
        }
        let (az0, alt0) = self.points[idx - 1];
        Degrees::new(alt0 + (alt1 - alt0) * (az - az0) / (az1 - az0))
    }

    /// True when a position clears the local horizon.
    pub fn is_clear(&self, position: &AltAz) -> bool {
        position.altitude.value() >= self.altitude_at(position.azimuth).value()
    }
}
