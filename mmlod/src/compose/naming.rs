//! Group labelling from the def-type name tables.

use crate::config::DefConfig;
use crate::def::DEF_TYPE_CREATURE;

/// Human-readable label for a group, falling back to `Group N` for def
/// types without a table. Creature groups 17-19 are directional
/// specials renamed for creatures in the cast / second-attack sets.
#[must_use]
pub fn group_label(
    config: &DefConfig,
    def_type: u32,
    group_index: u32,
    creature_name: &str,
) -> String {
    let Some(table) = config.group_names(def_type) else {
        return format!("Group {group_index}");
    };
    let Some(name) = table.get(&group_index) else {
        return format!("Group {group_index}");
    };

    if def_type == DEF_TYPE_CREATURE && (17..=19).contains(&group_index) {
        let direction = ["Up", "Straight", "Down"][(group_index - 17) as usize];
        if config.creatures_with_attack2.contains(creature_name) {
            return format!("Attack {direction} 2");
        }
        if config.creatures_with_cast.contains(creature_name) {
            return format!("Cast {direction}");
        }
    }
    name.clone()
}

/// Whether a label is the numeric fallback rather than a table name.
#[must_use]
pub fn is_fallback_label(label: &str) -> bool {
    label.starts_with("Group ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_and_fallbacks() {
        let config = DefConfig::default();
        assert_eq!(group_label(&config, 0x42, 2, ""), "Standing");
        assert_eq!(group_label(&config, 0x49, 4, ""), "Cast Spell");
        assert_eq!(group_label(&config, 0x42, 99, ""), "Group 99");
        assert_eq!(group_label(&config, 0x46, 0, ""), "Group 0");
        assert!(is_fallback_label("Group 3"));
        assert!(!is_fallback_label("Standing"));
    }

    #[test]
    fn special_groups_rename_for_casters() {
        let mut config = DefConfig::default();
        config.creatures_with_cast.insert("Lich".to_string());
        config.creatures_with_attack2.insert("Hydra".to_string());
        assert_eq!(group_label(&config, 0x42, 17, "Lich"), "Cast Up");
        assert_eq!(group_label(&config, 0x42, 18, "Lich"), "Cast Straight");
        assert_eq!(group_label(&config, 0x42, 19, "Hydra"), "Attack Down 2");
        assert_eq!(group_label(&config, 0x42, 18, "Peasant"), "Special Straight");
    }
}
