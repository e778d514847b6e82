//! Layer splitting
//!
//! A virtual layer that lands on more than one physical display arrives
//! with the same VID on each, but the IVI compositor needs globally unique
//! layer ids. Every occurrence after the first gets a fresh physical id,
//! seeded as `VID * 100 + rdisplay_id` and bumped past any collision with
//! the current pixel state or previously allocated ids.
//!
//! The `(rdisplay_id, original VID) → physical id` table keeps a given
//! virtual-layer-on-display at the same physical id across successive
//! commands. Each pass rebuilds the table from the mappings it actually
//! used, so entries for vanished layers age out.

use std::collections::{HashMap, HashSet};

use crate::pixel::NodePixelScreens;

/// Mapping of `(rdisplay_id, original VID)` to the assigned physical id.
pub type SplitIdTable = HashMap<(i32, i32), i32>;

/// Rename duplicated layer VIDs in place and refresh the id table.
pub fn split_layers(nps: &mut NodePixelScreens, table: &mut SplitIdTable) {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    let mut existing: HashSet<i32> = HashSet::new();
    for pscreen in &nps.pscreens {
        for player in &pscreen.players {
            *counts.entry(player.vid).or_insert(0) += 1;
            existing.insert(player.vid);
        }
    }

    let mut diff: SplitIdTable = HashMap::new();
    let mut kept: HashSet<i32> = HashSet::new();

    for pscreen in &mut nps.pscreens {
        let rdisplay_id = pscreen.rdisplay.rdisplay_id;
        for player in &mut pscreen.players {
            let vid = player.vid;
            if counts[&vid] < 2 {
                continue;
            }
            player.vid = resolve_split_id(vid, rdisplay_id, table, &mut diff, &mut kept, &mut existing);
        }
    }

    *table = diff;
}

fn resolve_split_id(
    vid: i32,
    rdisplay_id: i32,
    table: &SplitIdTable,
    diff: &mut SplitIdTable,
    kept: &mut HashSet<i32>,
    existing: &mut HashSet<i32>,
) -> i32 {
    // a mapping from an earlier command wins; identity stays stable
    if let Some(&id) = table.get(&(rdisplay_id, vid)) {
        diff.insert((rdisplay_id, vid), id);
        return id;
    }

    // first occurrence without history keeps the original VID
    if kept.insert(vid) {
        diff.insert((rdisplay_id, vid), vid);
        return vid;
    }

    let mut id = vid * 100 + rdisplay_id;
    while existing.contains(&id)
        || table.keys().any(|&(_, original)| original == id)
        || table.values().any(|&assigned| assigned == id)
        || diff.values().any(|&assigned| assigned == id)
    {
        id += 1;
    }

    diff.insert((rdisplay_id, vid), id);
    existing.insert(id);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelLayer, PixelScreen, RealDisplay};

    fn shared_layer_screens(vid: i32, rdisplay_ids: &[i32]) -> NodePixelScreens {
        let pscreens = rdisplay_ids
            .iter()
            .map(|&rdisplay_id| PixelScreen {
                rdisplay: RealDisplay {
                    node_id: 0,
                    pixel_w: 1920,
                    pixel_h: 1080,
                    vdisplay_id: rdisplay_id,
                    rdisplay_id,
                },
                players: vec![PixelLayer { vid, ..Default::default() }],
                psafety_areas: vec![],
            })
            .collect();
        NodePixelScreens { node_id: 0, pscreens }
    }

    fn layer_vids(nps: &NodePixelScreens) -> Vec<i32> {
        nps.pscreens
            .iter()
            .flat_map(|s| s.players.iter().map(|l| l.vid))
            .collect()
    }

    #[test]
    fn test_split_keeps_first_renames_rest() {
        let mut nps = shared_layer_screens(7, &[0, 1]);
        let mut table = SplitIdTable::new();
        split_layers(&mut nps, &mut table);

        let vids = layer_vids(&nps);
        assert_eq!(vids[0], 7);
        assert_eq!(vids[1], 7 * 100 + 1);
    }

    #[test]
    fn test_split_ids_unique_per_screen_set() {
        let mut nps = shared_layer_screens(7, &[0, 1, 2]);
        let mut table = SplitIdTable::new();
        split_layers(&mut nps, &mut table);

        let vids = layer_vids(&nps);
        let unique: HashSet<i32> = vids.iter().copied().collect();
        assert_eq!(unique.len(), vids.len());
    }

    #[test]
    fn test_split_is_stable_across_commands() {
        let mut table = SplitIdTable::new();

        let mut first = shared_layer_screens(7, &[0, 1]);
        split_layers(&mut first, &mut table);
        let first_vids = layer_vids(&first);

        let mut second = shared_layer_screens(7, &[0, 1]);
        split_layers(&mut second, &mut table);
        assert_eq!(layer_vids(&second), first_vids);
    }

    #[test]
    fn test_split_is_stable_under_reordered_screens() {
        let mut table = SplitIdTable::new();

        let mut first = shared_layer_screens(7, &[0, 1]);
        split_layers(&mut first, &mut table);

        // same topology, displays delivered in the other order
        let mut reordered = shared_layer_screens(7, &[1, 0]);
        split_layers(&mut reordered, &mut table);

        let by_display: HashMap<i32, i32> = reordered
            .pscreens
            .iter()
            .map(|s| (s.rdisplay.rdisplay_id, s.players[0].vid))
            .collect();
        let first_by_display: HashMap<i32, i32> = first
            .pscreens
            .iter()
            .map(|s| (s.rdisplay.rdisplay_id, s.players[0].vid))
            .collect();
        assert_eq!(by_display, first_by_display);
    }

    #[test]
    fn test_seed_collision_bumps() {
        // a layer already owns the would-be seed id
        let mut nps = shared_layer_screens(7, &[0, 1]);
        nps.pscreens[0].players.push(PixelLayer { vid: 701, ..Default::default() });

        let mut table = SplitIdTable::new();
        split_layers(&mut nps, &mut table);

        let vids = layer_vids(&nps);
        assert!(vids.contains(&702), "seed 701 must be skipped, got {:?}", vids);
    }

    #[test]
    fn test_unique_layers_untouched() {
        let mut nps = shared_layer_screens(7, &[0]);
        nps.pscreens[0].players.push(PixelLayer { vid: 8, ..Default::default() });

        let mut table = SplitIdTable::new();
        split_layers(&mut nps, &mut table);

        assert_eq!(layer_vids(&nps), vec![7, 8]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_mappings_age_out() {
        let mut table = SplitIdTable::new();

        let mut first = shared_layer_screens(7, &[0, 1]);
        split_layers(&mut first, &mut table);
        assert!(!table.is_empty());

        // next command no longer duplicates anything
        let mut second = shared_layer_screens(9, &[0]);
        split_layers(&mut second, &mut table);
        assert!(table.is_empty());
    }
}
