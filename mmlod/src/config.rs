//! Caller-supplied configuration tables.
//!
//! Everything the composer needs to know beyond the DEF bytes themselves
//! lives here: crop rectangles, group-name tables, the HotA palette-fix
//! sets, and the duration rules. The tables are immutable once built;
//! there is no global state. `Default` carries the stock tables, and the
//! whole structure deserialises from the legacy JSON config layout.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::def::{DEF_TYPE_CREATURE, DEF_TYPE_HERO, DEF_TYPE_MAP_OBJECT};

/// Per-object metadata from the object-ID map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "nameHotA")]
    pub name_hota: Option<String>,
    #[serde(default, rename = "sub_type")]
    pub sub_type: Option<String>,
}

/// One duration rule: match on def type, group, and optionally a frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationOverride {
    pub def_type: u32,
    pub group: u32,
    #[serde(default)]
    pub frame: Option<u32>,
    pub ms: u32,
}

/// Frame duration rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DurationConfig {
    /// Fallback per-frame duration.
    pub default_ms: u32,
    /// Map-creature animations run faster than the fallback.
    pub map_creature_ms: u32,
    /// The held (most repeated) frame of a map creature lingers.
    pub held_frame_ms: u32,
    pub overrides: Vec<DurationOverride>,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            default_ms: 100,
            map_creature_ms: 167,
            held_frame_ms: 1000,
            overrides: vec![
                DurationOverride {
                    def_type: DEF_TYPE_HERO,
                    group: 1,
                    frame: None,
                    ms: 125,
                },
                DurationOverride {
                    def_type: DEF_TYPE_HERO,
                    group: 4,
                    frame: Some(5),
                    ms: 1000,
                },
                DurationOverride {
                    def_type: DEF_TYPE_CREATURE,
                    group: 2,
                    frame: Some(7),
                    ms: 3000,
                },
            ],
        }
    }
}

/// The composer's configuration tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefConfig {
    /// Crop rectangles `[left, top, right, bottom]` keyed by def-type
    /// digit, plus name-token variants such as `4Airship`.
    pub crop_bounds: BTreeMap<String, [i32; 4]>,
    pub creature_group_names: BTreeMap<u32, String>,
    pub map_object_group_names: BTreeMap<u32, String>,
    pub hero_group_names: BTreeMap<u32, String>,
    /// Creatures whose groups 17-19 are casts rather than specials.
    pub creatures_with_cast: BTreeSet<String>,
    /// Creatures whose groups 17-19 are a second attack.
    pub creatures_with_attack2: BTreeSet<String>,
    /// DEF ids (lowercase) whose indices 2/3 carry shadow under HotA.
    #[serde(rename = "hotaShadowP2P3")]
    pub hota_shadow_p2p3: BTreeSet<String>,
    /// DEF ids (lowercase) whose index 255 is background under HotA.
    #[serde(rename = "hotaPalette255To5")]
    pub hota_palette_255_to_5: BTreeSet<String>,
    /// DEF ids (lowercase) whose selection index stays opaque.
    pub keep_selection_palette: BTreeSet<String>,
    /// Object-ID map: lowercase DEF id to display metadata.
    #[serde(rename = "objectsByID")]
    pub objects_by_id: BTreeMap<String, ObjectInfo>,
    pub durations: DurationConfig,
}

impl Default for DefConfig {
    fn default() -> Self {
        let mut crop_bounds = BTreeMap::new();
        crop_bounds.insert("4".to_string(), [15, 3, 77, 64]);
        crop_bounds.insert("4Airship".to_string(), [0, 0, 85, 127]);
        crop_bounds.insert("4Boat".to_string(), [0, 0, 85, 127]);

        Self {
            crop_bounds,
            creature_group_names: name_table(&CREATURE_GROUPS),
            map_object_group_names: name_table(&MAP_OBJECT_GROUPS),
            hero_group_names: name_table(&HERO_GROUPS),
            creatures_with_cast: BTreeSet::new(),
            creatures_with_attack2: BTreeSet::new(),
            hota_shadow_p2p3: BTreeSet::new(),
            hota_palette_255_to_5: BTreeSet::new(),
            keep_selection_palette: BTreeSet::new(),
            objects_by_id: BTreeMap::new(),
            durations: DurationConfig::default(),
        }
    }
}

impl DefConfig {
    /// Object metadata for a DEF id, if mapped.
    #[must_use]
    pub fn object(&self, def_name: &str) -> Option<&ObjectInfo> {
        self.objects_by_id.get(&def_name.to_ascii_lowercase())
    }

    /// Display name for a DEF id; with `prefer_hota` the HotA name wins.
    #[must_use]
    pub fn object_name(&self, def_name: &str, prefer_hota: bool) -> Option<String> {
        let info = self.object(def_name)?;
        let picked = if prefer_hota {
            info.name_hota.as_ref().or(info.name.as_ref())
        } else {
            info.name.as_ref().or(info.name_hota.as_ref())
        };
        picked.cloned()
    }

    /// Whether the DEF id maps to an adventure-map creature.
    #[must_use]
    pub fn is_adv_map_creature(&self, def_name: &str) -> bool {
        self.object(def_name)
            .and_then(|o| o.sub_type.as_deref())
            == Some("creature")
    }

    #[must_use]
    pub fn uses_hota_shadow_p2p3(&self, def_name: &str, hota_active: bool) -> bool {
        hota_active && self.hota_shadow_p2p3.contains(&def_name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn needs_palette_255_fix(&self, def_name: &str, hota_active: bool) -> bool {
        hota_active && self.hota_palette_255_to_5.contains(&def_name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn keeps_selection_palette(&self, def_name: &str) -> bool {
        self.keep_selection_palette.contains(&def_name.to_ascii_lowercase())
    }

    /// The group-name table for a def type, when one exists.
    #[must_use]
    pub fn group_names(&self, def_type: u32) -> Option<&BTreeMap<u32, String>> {
        match def_type {
            DEF_TYPE_CREATURE => Some(&self.creature_group_names),
            DEF_TYPE_MAP_OBJECT => Some(&self.map_object_group_names),
            DEF_TYPE_HERO => Some(&self.hero_group_names),
            _ => None,
        }
    }
}

fn name_table(pairs: &[(u32, &str)]) -> BTreeMap<u32, String> {
    pairs
        .iter()
        .map(|&(i, name)| (i, name.to_string()))
        .collect()
}

const CREATURE_GROUPS: [(u32, &str); 22] = [
    (0, "Moving"),
    (1, "Mouse Over"),
    (2, "Standing"),
    (3, "Getting Hit"),
    (4, "Defend"),
    (5, "Death"),
    (6, "Unused Death"),
    (7, "Turn Left"),
    (8, "Turn Right"),
    (9, "Turn Left"),
    (10, "Turn Right"),
    (11, "Attack Up"),
    (12, "Attack Straight"),
    (13, "Attack Down"),
    (14, "Shoot Up"),
    (15, "Shoot Straight"),
    (16, "Shoot Down"),
    (17, "Special Up"),
    (18, "Special Straight"),
    (19, "Special Down"),
    (20, "Start Moving"),
    (21, "Stop Moving"),
];

const HERO_GROUPS: [(u32, &str); 5] = [
    (0, "Standing"),
    (1, "Shuffle"),
    (2, "Failure"),
    (3, "Victory"),
    (4, "Cast Spell"),
];

const MAP_OBJECT_GROUPS: [(u32, &str); 1] = [(0, "Idle")];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_overlays_defaults() {
        let json = r#"{
            "cropBounds": {"2": [10, 10, 20, 20]},
            "hotaShadowP2P3": ["avwattac"],
            "keepSelectionPalette": ["clone"],
            "objectsByID": {
                "avwattac": {"name": "Water Elemental", "sub_type": "creature"}
            }
        }"#;
        let config: DefConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.crop_bounds.get("2"), Some(&[10, 10, 20, 20]));
        assert!(config.uses_hota_shadow_p2p3("AvWAttac", true));
        assert!(!config.uses_hota_shadow_p2p3("AvWAttac", false));
        assert!(config.keeps_selection_palette("Clone"));
        assert_eq!(
            config.object_name("AVWATTAC", false).as_deref(),
            Some("Water Elemental")
        );
        assert!(config.is_adv_map_creature("avwattac"));
        // Unlisted keys keep their defaults.
        assert_eq!(config.durations.default_ms, 100);
        assert_eq!(
            config.creature_group_names.get(&2).map(String::as_str),
            Some("Standing")
        );
    }
}
