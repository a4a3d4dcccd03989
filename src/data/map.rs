use nalgebra::Vector2;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::error::{FilterError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(id: u32, x: f64, y: f64) -> Landmark {
        Landmark { id, x, y }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

/// Row layout of the map file: `x<TAB>y<TAB>id`
#[derive(Debug, Deserialize)]
struct MapRecord {
    x: f64,
    y: f64,
    id: u32,
}

/// Known landmarks, kept in file order.
///
/// Order matters: nearest neighbour ties resolve to the landmark listed first.
#[derive(Debug, Clone, Default)]
pub struct LandmarkMap {
    landmarks: Vec<Landmark>,
}

impl LandmarkMap {
    pub fn new(landmarks: Vec<Landmark>) -> Result<LandmarkMap> {
        let mut seen = FxHashSet::default();
        for lm in &landmarks {
            if !seen.insert(lm.id) {
                return Err(FilterError::DuplicateLandmark(lm.id));
            }
        }
        Ok(LandmarkMap { landmarks })
    }

    /// Parse a tab separated map with one `x y id` record per line and no header.
    pub fn from_reader<R: Read>(reader: R) -> Result<LandmarkMap> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut landmarks = Vec::new();
        for record in rdr.deserialize() {
            let MapRecord { x, y, id } = record?;
            landmarks.push(Landmark { id, x, y });
        }
        log::debug!("parsed {} landmarks", landmarks.len());
        LandmarkMap::new(landmarks)
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Read a landmark map file from disk.
pub fn read_map<P: AsRef<Path>>(path: P) -> Result<LandmarkMap> {
    let file = std::fs::File::open(path)?;
    LandmarkMap::from_reader(std::io::BufReader::new(file))
}
