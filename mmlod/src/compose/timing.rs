//! Frame durations.
//!
//! A pure function of `(def_type, group, frame index, frame count)` plus
//! the duration table; the held frame of a map creature (its most
//! repeated frame name) lingers.

use crate::config::DurationConfig;
use crate::def::DEF_TYPE_MAP_CREATURE;

/// Index of the first occurrence of the most repeated name.
#[must_use]
pub fn most_repeated_frame(names: &[String]) -> usize {
    let mut best = 0usize;
    let mut best_count = 0usize;
    for (i, name) in names.iter().enumerate() {
        if names[..i].iter().any(|n| n == name) {
            continue;
        }
        let count = names.iter().filter(|n| *n == name).count();
        if count > best_count {
            best_count = count;
            best = i;
        }
    }
    best
}

/// Duration of one frame in milliseconds.
#[must_use]
pub fn frame_duration(
    config: &DurationConfig,
    def_type: u32,
    group_index: u32,
    frame_index: usize,
    _frame_count: usize,
    held_frame: Option<usize>,
    is_map_creature: bool,
) -> u32 {
    for rule in &config.overrides {
        if rule.def_type == def_type
            && rule.group == group_index
            && rule.frame.map_or(true, |f| f as usize == frame_index)
        {
            return rule.ms;
        }
    }
    if def_type == DEF_TYPE_MAP_CREATURE {
        if is_map_creature && held_frame == Some(frame_index) {
            return config.held_frame_ms;
        }
        return config.map_creature_ms;
    }
    config.default_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefConfig;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn most_repeated_picks_first_index_of_winner() {
        assert_eq!(most_repeated_frame(&names(&["a", "b", "b", "a", "b"])), 1);
        assert_eq!(most_repeated_frame(&names(&["a", "b"])), 0);
        assert_eq!(most_repeated_frame(&names(&[])), 0);
    }

    #[test]
    fn table_rules() {
        let d = DefConfig::default().durations;
        // Hero shuffle runs at eight frames a second.
        assert_eq!(frame_duration(&d, 0x49, 1, 3, 8, None, false), 125);
        // Hero cast holds on its fifth frame.
        assert_eq!(frame_duration(&d, 0x49, 4, 5, 8, None, false), 1000);
        assert_eq!(frame_duration(&d, 0x49, 4, 4, 8, None, false), 100);
        // Battle creature standing holds on frame 7.
        assert_eq!(frame_duration(&d, 0x42, 2, 7, 8, None, false), 3000);
        assert_eq!(frame_duration(&d, 0x42, 2, 6, 8, None, false), 100);
    }

    #[test]
    fn map_creature_held_frame() {
        let d = DefConfig::default().durations;
        assert_eq!(frame_duration(&d, 0x43, 0, 2, 6, Some(2), true), 1000);
        assert_eq!(frame_duration(&d, 0x43, 0, 3, 6, Some(2), true), 167);
        // Non-creature map DEFs never hold.
        assert_eq!(frame_duration(&d, 0x43, 0, 2, 6, Some(2), false), 167);
    }

    #[test]
    fn durations_are_deterministic() {
        let d = DefConfig::default().durations;
        let a = frame_duration(&d, 0x44, 3, 1, 10, None, false);
        let b = frame_duration(&d, 0x44, 3, 1, 10, None, false);
        assert_eq!(a, b);
        assert_eq!(a, 100);
    }
}
