//! Material library: tagged material records with a property map (C2).

use std::collections::HashMap;

use crate::error::{FeaError, Result};

/// An opaque, cheap-to-copy handle into a [`MaterialLibrary`]. Elements
/// hold a handle, never a pointer or a name, so the library can be
/// relocated or rebuilt between solves without invalidating the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub usize);

/// Material model variant. Only `Isotropic` has a fully worked
/// constitutive model in this crate (`Hyperelastic`/`Viscoelastic` are
/// explicitly out of scope per the Non-goals; they are still
/// represented so the property-map / variant-validation machinery is
/// exhaustive and so a caller's declared intent is preserved even when
/// the solver cannot yet act on it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialModel {
    Isotropic,
    Orthotropic,
    Anisotropic,
    Hyperelastic,
    ElastoPlastic,
    Viscoelastic,
    Composite,
}

/// Keys accepted by at least one material model. Access to a key not
/// legal for a material's variant fails with `InvalidProperty`.
const ISOTROPIC_REQUIRED: &[&str] = &["youngs_modulus", "poissons_ratio", "density"];
const ISOTROPIC_OPTIONAL: &[&str] = &[
    "thermal_expansion_coeff",
    "thermal_conductivity",
    "specific_heat",
    "yield_stress",
    "hardening_modulus",
];
const ISOTROPIC_DERIVED: &[&str] = &["shear_modulus", "bulk_modulus"];

fn isotropic_allowed(key: &str) -> bool {
    ISOTROPIC_REQUIRED.contains(&key) || ISOTROPIC_OPTIONAL.contains(&key) || ISOTROPIC_DERIVED.contains(&key)
}

/// A named, tagged material record. Properties live in a flat
/// `name -> f64` map rather than fixed struct fields so that every
/// variant can carry the set of keys appropriate to it without one
/// variant's fields littering another's.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub model: MaterialModel,
    properties: HashMap<String, f64>,
}

impl Material {
    /// Build an isotropic material, validating required keys and
    /// computing the derived `shear_modulus` / `bulk_modulus` entries.
    pub fn isotropic(
        name: impl Into<String>,
        youngs_modulus: f64,
        poissons_ratio: f64,
        density: f64,
    ) -> Result<Self> {
        if !(youngs_modulus > 0.0) {
            return Err(FeaError::InvalidProperty(format!(
                "youngs_modulus must be > 0, got {}",
                youngs_modulus
            )));
        }
        if !(poissons_ratio > -1.0 && poissons_ratio <= 0.5) {
            return Err(FeaError::InvalidProperty(format!(
                "poissons_ratio must lie in (-1, 0.5], got {}",
                poissons_ratio
            )));
        }
        if !(density > 0.0) {
            return Err(FeaError::InvalidProperty(format!(
                "density must be > 0, got {}",
                density
            )));
        }

        let mut properties = HashMap::new();
        properties.insert("youngs_modulus".to_string(), youngs_modulus);
        properties.insert("poissons_ratio".to_string(), poissons_ratio);
        properties.insert("density".to_string(), density);
        properties.insert(
            "shear_modulus".to_string(),
            youngs_modulus / (2.0 * (1.0 + poissons_ratio)),
        );
        properties.insert(
            "bulk_modulus".to_string(),
            youngs_modulus / (3.0 * (1.0 - 2.0 * poissons_ratio)),
        );

        Ok(Self {
            name: name.into(),
            model: MaterialModel::Isotropic,
            properties,
        })
    }

    /// Attach an optional thermal property (`thermal_expansion_coeff`,
    /// `thermal_conductivity`, or `specific_heat`) to an isotropic
    /// material.
    pub fn with_thermal_property(mut self, key: &str, value: f64) -> Result<Self> {
        if self.model == MaterialModel::Isotropic && !ISOTROPIC_OPTIONAL.contains(&key) {
            return Err(FeaError::InvalidProperty(format!(
                "'{}' is not a recognized thermal property",
                key
            )));
        }
        self.properties.insert(key.to_string(), value);
        Ok(self)
    }

    /// Construct a material record of a non-isotropic variant with an
    /// arbitrary property map. Used by callers modeling Orthotropic,
    /// Anisotropic, Hyperelastic, ElastoPlastic, Viscoelastic, or
    /// Composite materials; this crate's element kernels only consume
    /// the `Isotropic` variant (per the Non-goals), but the data model
    /// is exhaustive over all seven kinds.
    pub fn tagged(name: impl Into<String>, model: MaterialModel, properties: HashMap<String, f64>) -> Self {
        Self {
            name: name.into(),
            model,
            properties,
        }
    }

    /// Fetch a property, failing with `InvalidProperty` if the key is
    /// not legal for this material's variant or was never set.
    pub fn get(&self, key: &str) -> Result<f64> {
        if self.model == MaterialModel::Isotropic && !isotropic_allowed(key) {
            return Err(FeaError::InvalidProperty(format!(
                "'{}' is not a valid property for an Isotropic material",
                key
            )));
        }
        self.properties.get(key).copied().ok_or_else(|| {
            FeaError::InvalidProperty(format!(
                "material '{}' has no value set for property '{}'",
                self.name, key
            ))
        })
    }

    pub fn youngs_modulus(&self) -> Result<f64> {
        self.get("youngs_modulus")
    }

    pub fn poissons_ratio(&self) -> Result<f64> {
        self.get("poissons_ratio")
    }

    pub fn density(&self) -> Result<f64> {
        self.get("density")
    }

    pub fn shear_modulus(&self) -> Result<f64> {
        self.get("shear_modulus")
    }

    pub fn bulk_modulus(&self) -> Result<f64> {
        self.get("bulk_modulus")
    }

    /// `None` when the material was never given a `yield_stress` (the
    /// common case: purely-elastic isotropic materials), rather than
    /// the `InvalidProperty` error `get()` would raise.
    pub fn yield_stress(&self) -> Option<f64> {
        self.get("yield_stress").ok()
    }

    pub fn hardening_modulus(&self) -> Option<f64> {
        self.get("hardening_modulus").ok()
    }

    pub fn is_valid_for_structural(&self) -> bool {
        self.get("youngs_modulus").is_ok() && self.get("poissons_ratio").is_ok()
    }
}

/// A named collection of materials plus a handle-based element-id
/// assignment registry, mirroring the mesh's own id-to-index idiom.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
    name_index: HashMap<String, usize>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: Material) -> MaterialHandle {
        let handle = MaterialHandle(self.materials.len());
        self.name_index.insert(material.name.clone(), handle.0);
        self.materials.push(material);
        handle
    }

    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0)
    }

    pub fn get_by_name(&self, name: &str) -> Option<(MaterialHandle, &Material)> {
        self.name_index
            .get(name)
            .map(|&i| (MaterialHandle(i), &self.materials[i]))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isotropic_steel_derives_shear_and_bulk_modulus() {
        let steel = Material::isotropic("steel", 210e9, 0.3, 7800.0).unwrap();
        let g = steel.shear_modulus().unwrap();
        let k = steel.bulk_modulus().unwrap();
        assert!((g - 210e9 / (2.0 * 1.3)).abs() < 1.0);
        assert!((k - 210e9 / (3.0 * 0.4)).abs() < 1.0);
    }

    #[test]
    fn rejects_invalid_poisson_ratio() {
        assert!(Material::isotropic("bad", 210e9, 0.5000001, 7800.0).is_err());
        assert!(Material::isotropic("bad", 210e9, -1.0, 7800.0).is_err());
    }

    #[test]
    fn rejects_non_positive_modulus_or_density() {
        assert!(Material::isotropic("bad", -1.0, 0.3, 7800.0).is_err());
        assert!(Material::isotropic("bad", 210e9, 0.3, 0.0).is_err());
    }

    #[test]
    fn orthotropic_material_rejects_youngs_modulus_key() {
        let mut props = HashMap::new();
        props.insert("e11".to_string(), 100e9);
        let ortho = Material::tagged("composite_ply", MaterialModel::Orthotropic, props);
        assert!(ortho.get("youngs_modulus").is_err());
        assert!(ortho.get("e11").is_ok());
    }

    #[test]
    fn material_library_lookup_by_handle_and_name() {
        let mut lib = MaterialLibrary::new();
        let steel = Material::isotropic("steel", 210e9, 0.3, 7800.0).unwrap();
        let handle = lib.add(steel);
        assert_eq!(lib.get(handle).unwrap().name, "steel");
        let (found_handle, found) = lib.get_by_name("steel").unwrap();
        assert_eq!(found_handle, handle);
        assert_eq!(found.name, "steel");
    }
}
