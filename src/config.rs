//! Host preferences.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::CsgError;

/// What the document stores for a computed feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Representation {
    /// The exact backend shape.
    #[default]
    Shape,
    /// The backend's tessellation of the shape.
    Mesh,
}

/// Options recognized by the document host. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Reuse an existing feature with equal parameters instead of adding a new one.
    pub cached: bool,
    /// Select newly created features.
    pub autosel: bool,
    /// Emit backend booleans instead of symbolic feature types.
    pub originop: bool,
    /// Recompute right after a command runs.
    pub autorecomp: bool,
    /// Compute the face trace on every execute.
    pub autotrace: bool,
    pub rep: Representation,
    pub hard: bool,
    pub pert: bool,
    pub incmdline: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            cached: false,
            autosel: true,
            originop: false,
            autorecomp: false,
            autotrace: true,
            rep: Representation::Shape,
            hard: false,
            pert: false,
            incmdline: false,
        }
    }
}

impl Preferences {
    pub fn from_toml_str(text: &str) -> Result<Self, CsgError> {
        let prefs: Preferences = toml::from_str(text).map_err(|e| CsgError::Config(e.to_string()))?;
        log::debug!("loaded preferences {prefs:?}");
        Ok(prefs)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CsgError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CsgError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, CsgError> {
        toml::to_string(self).map_err(|e| CsgError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let prefs = Preferences::from_toml_str("cached = true\nrep = \"Mesh\"\n").unwrap();
        assert!(prefs.cached);
        assert_eq!(prefs.rep, Representation::Mesh);
        assert!(prefs.autosel);
        assert!(prefs.autotrace);
        assert!(!prefs.originop);
        assert_eq!(Preferences::from_toml_str("").unwrap(), Preferences::default());
    }

    #[test]
    fn bad_input_is_a_config_error() {
        assert!(matches!(
            Preferences::from_toml_str("rep = \"Wireframe\""),
            Err(CsgError::Config(_))
        ));
        assert!(matches!(
            Preferences::load("/nonexistent/magicpart.toml"),
            Err(CsgError::Config(_))
        ));
    }

    #[test]
    fn round_trips_through_toml() {
        let prefs = Preferences {
            hard: true,
            rep: Representation::Mesh,
            ..Preferences::default()
        };
        let text = prefs.to_toml_string().unwrap();
        assert_eq!(Preferences::from_toml_str(&text).unwrap(), prefs);
    }
}
