use geo::MultiPolygon;

use super::GeoType;

/// An electoral geographic entity (island, district, municipality, precinct or unit).
///
/// `code` is unique within `ty`. `parent_code` refers to the enclosing unit by code and
/// does not own it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicUnit {
    pub code: String,
    pub ty: GeoType,
    pub name_en: Option<String>,
    pub name_es: Option<String>,
    pub parent_code: Option<String>,
    pub geometry: Option<MultiPolygon<f64>>,
    pub population: Option<f64>,
    pub area_km2: Option<f64>,
}

impl GeographicUnit {
    pub fn new(ty: GeoType, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ty,
            name_en: None,
            name_es: None,
            parent_code: None,
            geometry: None,
            population: None,
            area_km2: None,
        }
    }

    pub fn with_geometry(mut self, geometry: MultiPolygon<f64>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_parent(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_code = Some(parent_code.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name_es = Some(name.clone());
        self.name_en = Some(name);
        self
    }

    /// Best available display name, preferring the Spanish form.
    pub fn name(&self) -> Option<&str> {
        self.name_es.as_deref().or(self.name_en.as_deref())
    }
}
