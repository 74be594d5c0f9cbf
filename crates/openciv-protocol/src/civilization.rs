use serde::{Deserialize, Serialize};

/// One selectable faction, as described by the civilization catalog.
///
/// Field names follow the catalog YAML (`icon_name`, `start_bias_desc`, ...)
/// and are sent to clients unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivilizationDescriptor {
    pub name: String,
    pub icon_name: String,
    #[serde(default)]
    pub start_bias_desc: String,
    #[serde(default)]
    pub unique_unit_descs: Vec<String>,
    #[serde(default)]
    pub unique_building_descs: Vec<String>,
    #[serde(default)]
    pub ability_descs: Vec<String>,
    /// Settlement names in founding order.
    pub cities: Vec<String>,
}

impl CivilizationDescriptor {
    pub fn summary(&self) -> CivSummary {
        CivSummary {
            name: self.name.clone(),
            icon_name: self.icon_name.clone(),
        }
    }
}

/// Lightweight projection used by the civilization picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivSummary {
    pub name: String,
    pub icon_name: String,
}

/// Public view of a connected player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub name: String,
    pub civ_data: Option<CivilizationDescriptor>,
    pub requested_next_turn: bool,
}
