//! In-memory plant registry.
//!
//! Plants are kept in an ordered map keyed by name. Edits are applied to a
//! draft copy and only committed once the draft validates, so a failed edit
//! leaves the stored record untouched.

use crate::model::{ArrayConfig, ArrayPatch, ConfigEvent, PlantDocument, PlantPatch, PvPlant};
use crate::validate::{self, ValidationReport};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Prefix used for generated array names.
pub const ARRAY_NAME_PREFIX: &str = "Array";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("a plant named '{0}' already exists")]
    DuplicatePlant(String),
    #[error("no plant named '{0}'")]
    PlantNotFound(String),
    #[error("plant '{plant}' already has an array named '{array}'")]
    DuplicateArray { plant: String, array: String },
    #[error("plant '{plant}' has no array named '{array}'")]
    ArrayNotFound { plant: String, array: String },
    #[error("invalid configuration: {0}")]
    Invalid(ValidationReport),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlantRegistry {
    plants: IndexMap<String, PvPlant>,
    /// Top-level document sections other than `plant`, carried through saves.
    other: BTreeMap<String, serde_yaml::Value>,
}

impl PlantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PvPlant> {
        self.plants.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PvPlant> {
        self.plants.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plants.keys().map(String::as_str)
    }

    /// Build a registry from a parsed document, in document order.
    pub fn from_document(doc: PlantDocument) -> Result<Self, RegistryError> {
        let mut plants = IndexMap::with_capacity(doc.plant.len());
        for mut plant in doc.plant {
            normalize_plant(&mut plant);
            if plant.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if plants.contains_key(&plant.name) {
                return Err(RegistryError::DuplicatePlant(plant.name));
            }
            plants.insert(plant.name.clone(), plant);
        }
        Ok(Self {
            plants,
            other: doc.other,
        })
    }

    pub fn to_document(&self) -> PlantDocument {
        PlantDocument {
            plant: self.plants.values().cloned().collect(),
            other: self.other.clone(),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let plants: Vec<PvPlant> = self.plants.values().cloned().collect();
        validate::validate_plants(&plants)
    }

    /// Insert a new plant at the front of the ordering.
    pub fn add_plant(&mut self, mut plant: PvPlant) -> Result<ConfigEvent, RegistryError> {
        normalize_plant(&mut plant);
        if plant.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.plants.contains_key(&plant.name) {
            return Err(RegistryError::DuplicatePlant(plant.name));
        }
        check(validate::validate_plant(&plant))?;

        let name = plant.name.clone();
        self.plants.shift_insert(0, name.clone(), plant);
        debug!(plant = %name, "plant added");
        Ok(ConfigEvent::PlantAdded { plant: name })
    }

    pub fn edit_plant(
        &mut self,
        name: &str,
        patch: PlantPatch,
    ) -> Result<ConfigEvent, RegistryError> {
        let current = self
            .plants
            .get(name)
            .ok_or_else(|| RegistryError::PlantNotFound(name.to_string()))?;
        let mut draft = current.clone();

        if let Some(new_name) = patch.name {
            let new_name = new_name.trim().to_string();
            if new_name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if new_name != name && self.plants.contains_key(&new_name) {
                return Err(RegistryError::DuplicatePlant(new_name));
            }
            draft.name = new_name;
        }
        if let Some(inverter) = patch.inverter {
            draft.inverter = inverter.trim().to_string();
        }
        if let Some(micro) = patch.microinverter {
            draft.microinverter = micro;
        }
        check(validate::validate_plant(&draft))?;

        let event = if draft.name != name {
            ConfigEvent::PlantRenamed {
                from: name.to_string(),
                to: draft.name.clone(),
            }
        } else {
            ConfigEvent::PlantUpdated {
                plant: name.to_string(),
            }
        };
        self.commit_plant(name, draft);
        debug!(plant = %name, "plant edited");
        Ok(event)
    }

    pub fn remove_plant(&mut self, name: &str) -> Result<ConfigEvent, RegistryError> {
        self.plants
            .shift_remove(name)
            .ok_or_else(|| RegistryError::PlantNotFound(name.to_string()))?;
        debug!(plant = %name, "plant removed");
        Ok(ConfigEvent::PlantRemoved {
            plant: name.to_string(),
        })
    }

    /// Append an array to a plant, generating a name when it is blank.
    pub fn add_array(
        &mut self,
        plant_name: &str,
        mut array: ArrayConfig,
    ) -> Result<ConfigEvent, RegistryError> {
        let plant = self.plant_mut(plant_name)?;
        array.name = array.name.trim().to_string();
        if array.name.is_empty() {
            array.name = generated_array_name(&plant.arrays);
        } else if plant.array(&array.name).is_some() {
            return Err(RegistryError::DuplicateArray {
                plant: plant_name.to_string(),
                array: array.name,
            });
        }
        check(validate::validate_array(&array))?;

        let array_name = array.name.clone();
        plant.arrays.push(array);
        debug!(plant = %plant_name, array = %array_name, "array added");
        Ok(ConfigEvent::ArrayAdded {
            plant: plant_name.to_string(),
            array: array_name,
        })
    }

    pub fn edit_array(
        &mut self,
        plant_name: &str,
        array_name: &str,
        patch: ArrayPatch,
    ) -> Result<ConfigEvent, RegistryError> {
        let plant = self.plant_mut(plant_name)?;
        let idx = array_index(plant, array_name)?;
        let mut draft = plant.arrays[idx].clone();

        if let Some(new_name) = patch.name {
            let new_name = new_name.trim().to_string();
            if new_name.is_empty() {
                let others: Vec<ArrayConfig> = plant
                    .arrays
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, a)| a.clone())
                    .collect();
                draft.name = generated_array_name(&others);
            } else if new_name != array_name && plant.array(&new_name).is_some() {
                return Err(RegistryError::DuplicateArray {
                    plant: plant_name.to_string(),
                    array: new_name,
                });
            } else {
                draft.name = new_name;
            }
        }
        if let Some(tilt) = patch.tilt {
            draft.tilt = tilt;
        }
        if let Some(azimuth) = patch.azimuth {
            draft.azimuth = azimuth;
        }
        if let Some(mps) = patch.modules_per_string {
            draft.modules_per_string = mps;
        }
        if let Some(strings) = patch.strings {
            draft.strings = strings;
        }
        if let Some(module) = patch.module {
            draft.module = module.trim().to_string();
        }
        check(validate::validate_array(&draft))?;

        let event = if draft.name != array_name {
            ConfigEvent::ArrayRenamed {
                plant: plant_name.to_string(),
                from: array_name.to_string(),
                to: draft.name.clone(),
            }
        } else {
            ConfigEvent::ArrayUpdated {
                plant: plant_name.to_string(),
                array: array_name.to_string(),
            }
        };
        plant.arrays[idx] = draft;
        debug!(plant = %plant_name, array = %array_name, "array edited");
        Ok(event)
    }

    pub fn remove_array(
        &mut self,
        plant_name: &str,
        array_name: &str,
    ) -> Result<ConfigEvent, RegistryError> {
        let plant = self.plant_mut(plant_name)?;
        let idx = array_index(plant, array_name)?;
        plant.arrays.remove(idx);
        debug!(plant = %plant_name, array = %array_name, "array removed");
        Ok(ConfigEvent::ArrayRemoved {
            plant: plant_name.to_string(),
            array: array_name.to_string(),
        })
    }

    fn plant_mut(&mut self, name: &str) -> Result<&mut PvPlant, RegistryError> {
        self.plants
            .get_mut(name)
            .ok_or_else(|| RegistryError::PlantNotFound(name.to_string()))
    }

    /// Replace a plant, keeping its position even when the key changes.
    fn commit_plant(&mut self, old_name: &str, plant: PvPlant) {
        match self.plants.shift_remove_full(old_name) {
            Some((idx, _, _)) => {
                self.plants.shift_insert(idx, plant.name.clone(), plant);
            }
            None => {
                self.plants.insert(plant.name.clone(), plant);
            }
        }
    }
}

fn check(report: ValidationReport) -> Result<(), RegistryError> {
    if report.is_valid() {
        Ok(())
    } else {
        Err(RegistryError::Invalid(report))
    }
}

fn array_index(plant: &PvPlant, array_name: &str) -> Result<usize, RegistryError> {
    plant
        .arrays
        .iter()
        .position(|a| a.name == array_name)
        .ok_or_else(|| RegistryError::ArrayNotFound {
            plant: plant.name.clone(),
            array: array_name.to_string(),
        })
}

/// Lowest `Array N` (N >= 1) not used by any of `arrays`.
pub fn generated_array_name(arrays: &[ArrayConfig]) -> String {
    let taken: HashSet<&str> = arrays.iter().map(|a| a.name.as_str()).collect();
    (1..)
        .map(|n| format!("{ARRAY_NAME_PREFIX} {n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| ARRAY_NAME_PREFIX.to_string())
}

/// Trim the plant name, then fill and de-duplicate its array names.
pub fn normalize_plant(plant: &mut PvPlant) {
    plant.name = plant.name.trim().to_string();
    regenerate_array_names(plant);
}

/// Fill blank array names and de-duplicate collisions within a plant.
///
/// The first occurrence of a name keeps it; later ones get ` 2`, ` 3`, ...
/// skipping any suffix already used explicitly elsewhere in the plant.
pub fn regenerate_array_names(plant: &mut PvPlant) {
    let explicit: HashSet<String> = plant
        .arrays
        .iter()
        .map(|a| a.name.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    let mut taken: HashSet<String> = HashSet::new();
    for array in plant.arrays.iter_mut() {
        array.name = array.name.trim().to_string();
        if array.name.is_empty() {
            continue;
        }
        if taken.contains(&array.name) {
            let base = array.name.clone();
            array.name = (2..)
                .map(|n| format!("{base} {n}"))
                .find(|c| !taken.contains(c) && !explicit.contains(c))
                .unwrap_or(base);
        }
        taken.insert(array.name.clone());
    }

    for idx in 0..plant.arrays.len() {
        if plant.arrays[idx].name.is_empty() {
            plant.arrays[idx].name = generated_array_name(&plant.arrays);
        }
    }
}
