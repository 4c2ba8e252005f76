//! GeoTIFF georeferencing
//!
//! Reads the model tags and the GeoKey directory into a [`GeoInfo`] and
//! builds the tags written for new files.

use std::collections::HashMap;
use std::fmt;
use crate::types::GeoTransform;
use super::ifd::IFD;
use super::tags;

/// GeoKey identifiers
pub mod geo_keys {
    pub const MODEL_TYPE: u16 = 1024;
    pub const RASTER_TYPE: u16 = 1025;
    pub const CITATION: u16 = 1026;
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const GEOG_CITATION: u16 = 2049;
    pub const PROJECTED_CS_TYPE: u16 = 3072;
    pub const PCS_CITATION: u16 = 3073;

    pub const MODEL_PROJECTED: u16 = 1;
    pub const MODEL_GEOGRAPHIC: u16 = 2;
    pub const RASTER_PIXEL_IS_AREA: u16 = 1;
    pub const RASTER_PIXEL_IS_POINT: u16 = 2;
    /// Marks a user-defined (non-EPSG) coordinate system
    pub const USER_DEFINED: u16 = 32767;
}

/// Value of one GeoKey
#[derive(Debug, Clone, PartialEq)]
pub enum GeoKeyValue {
    Short(u16),
    Doubles(Vec<f64>),
    Ascii(String),
}

/// GeoTIFF information extracted from an IFD
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    /// Model pixel scale (ScaleX, ScaleY, ScaleZ)
    pub pixel_scale: Option<[f64; 3]>,
    /// First model tiepoint (I, J, K, X, Y, Z)
    pub tiepoint: Option<[f64; 6]>,
    /// Row-major 4x4 model transformation
    pub transformation: Option<[f64; 16]>,
    /// Decoded GeoKey directory
    pub keys: HashMap<u16, GeoKeyValue>,
}

impl GeoInfo {
    /// Extracts GeoTIFF information from an IFD; `None` without any GeoTIFF tag
    pub fn from_ifd(ifd: &IFD) -> Option<Self> {
        if !ifd.is_geotiff() {
            return None;
        }

        let mut info = GeoInfo::default();

        if let Some(v) = ifd.get_f64s(tags::MODEL_PIXEL_SCALE) {
            if v.len() >= 3 {
                info.pixel_scale = Some([v[0], v[1], v[2]]);
            }
        }
        if let Some(v) = ifd.get_f64s(tags::MODEL_TIEPOINT) {
            if v.len() >= 6 {
                info.tiepoint = Some([v[0], v[1], v[2], v[3], v[4], v[5]]);
            }
        }
        if let Some(v) = ifd.get_f64s(tags::MODEL_TRANSFORMATION) {
            if let Ok(m) = <[f64; 16]>::try_from(v.as_slice()) {
                info.transformation = Some(m);
            }
        }

        if let Some(dir) = ifd.get_u64s(tags::GEO_KEY_DIRECTORY) {
            let doubles = ifd.get_f64s(tags::GEO_DOUBLE_PARAMS).unwrap_or_default();
            let ascii = ifd.get_ascii(tags::GEO_ASCII_PARAMS).unwrap_or("");
            info.keys = parse_key_directory(&dir, &doubles, ascii);
        }

        Some(info)
    }

    fn short_key(&self, key: u16) -> Option<u16> {
        match self.keys.get(&key) {
            Some(GeoKeyValue::Short(v)) => Some(*v),
            _ => None,
        }
    }

    fn ascii_key(&self, key: u16) -> Option<&str> {
        match self.keys.get(&key) {
            Some(GeoKeyValue::Ascii(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Whether pixel values represent points rather than areas
    pub fn pixel_is_point(&self) -> bool {
        self.short_key(geo_keys::RASTER_TYPE) == Some(geo_keys::RASTER_PIXEL_IS_POINT)
    }

    /// EPSG code of the projected or geographic coordinate system
    pub fn epsg_code(&self) -> Option<u16> {
        [geo_keys::PROJECTED_CS_TYPE, geo_keys::GEOGRAPHIC_TYPE]
            .into_iter()
            .filter_map(|key| self.short_key(key))
            .find(|&code| code != 0 && code != geo_keys::USER_DEFINED)
    }

    /// Citation text of the coordinate system
    pub fn citation(&self) -> Option<&str> {
        [geo_keys::PCS_CITATION, geo_keys::CITATION, geo_keys::GEOG_CITATION]
            .into_iter()
            .find_map(|key| self.ascii_key(key))
    }

    /// Projection text: `EPSG:<code>` when known, else the citation, else empty
    pub fn projection(&self) -> String {
        match (self.epsg_code(), self.citation()) {
            (Some(code), _) => format!("EPSG:{}", code),
            (None, Some(citation)) => citation.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Pixel-to-model transform with the origin at the corner of pixel (0, 0)
    pub fn geo_transform(&self) -> Option<GeoTransform> {
        let mut gt = if let Some(m) = self.transformation {
            [m[3], m[0], m[1], m[7], m[4], m[5]]
        } else {
            let [sx, sy, _] = self.pixel_scale?;
            let [i, j, _, x, y, _] = self.tiepoint?;
            [x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy]
        };

        if self.pixel_is_point() {
            gt[0] -= 0.5 * gt[1] + 0.5 * gt[2];
            gt[3] -= 0.5 * gt[4] + 0.5 * gt[5];
        }

        Some(GeoTransform(gt))
    }
}

impl fmt::Display for GeoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let projection = self.projection();
        if !projection.is_empty() {
            writeln!(f, "Projection: {}", projection)?;
        }
        if let Some(gt) = self.geo_transform() {
            writeln!(f, "Origin: ({}, {})", gt.0[0], gt.0[3])?;
            writeln!(f, "Pixel size: ({}, {})", gt.0[1], gt.0[5])?;
        }
        Ok(())
    }
}

fn parse_key_directory(dir: &[u64], doubles: &[f64], ascii: &str) -> HashMap<u16, GeoKeyValue> {
    let mut keys = HashMap::new();
    if dir.len() < 4 {
        return keys;
    }

    for key in dir[4..].chunks_exact(4).take(dir[3] as usize) {
        let (id, location, count, value) = (key[0] as u16, key[1] as u16, key[2] as usize, key[3] as usize);
        let parsed = match location {
            0 => Some(GeoKeyValue::Short(value as u16)),
            tags::GEO_DOUBLE_PARAMS => doubles
                .get(value..value + count)
                .map(|v| GeoKeyValue::Doubles(v.to_vec())),
            tags::GEO_ASCII_PARAMS => ascii.get(value..value + count).map(|s| {
                GeoKeyValue::Ascii(s.trim_end_matches(['|', '\0']).to_string())
            }),
            tags::GEO_KEY_DIRECTORY => dir.get(value).map(|&v| GeoKeyValue::Short(v as u16)),
            _ => None,
        };
        if let Some(parsed) = parsed {
            keys.insert(id, parsed);
        }
    }

    keys
}

/// GeoKey directory and ASCII parameters describing `projection` for a new
/// file. An `EPSG:<code>` projection is written as a projected or (codes in
/// 4000..5000) geographic CRS key; any other non-empty text as a citation.
pub fn key_directory_for(projection: &str) -> (Vec<u16>, String) {
    let mut entries: Vec<[u16; 4]> = Vec::new();
    let mut ascii = String::new();

    let epsg = projection
        .strip_prefix("EPSG:")
        .and_then(|code| code.trim().parse::<u16>().ok());

    match epsg {
        Some(code) if (4000..5000).contains(&code) => {
            entries.push([geo_keys::MODEL_TYPE, 0, 1, geo_keys::MODEL_GEOGRAPHIC]);
            entries.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
            entries.push([geo_keys::GEOGRAPHIC_TYPE, 0, 1, code]);
        }
        Some(code) => {
            entries.push([geo_keys::MODEL_TYPE, 0, 1, geo_keys::MODEL_PROJECTED]);
            entries.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
            entries.push([geo_keys::PROJECTED_CS_TYPE, 0, 1, code]);
        }
        None if !projection.is_empty() => {
            ascii = format!("{}|", projection);
            entries.push([geo_keys::MODEL_TYPE, 0, 1, geo_keys::MODEL_PROJECTED]);
            entries.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
            entries.push([geo_keys::CITATION, tags::GEO_ASCII_PARAMS, ascii.len() as u16, 0]);
        }
        None => {
            entries.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
        }
    }

    let mut dir = vec![1, 1, 0, entries.len() as u16];
    dir.extend(entries.into_iter().flatten());
    (dir, ascii)
}
