//! Ordering engine.
//!
//! Turns the discovered clips into the processing plan: a lead clip first,
//! then the two categories interleaved in fixed-size blocks, then everything
//! uncategorized.

use crate::classify::{Category, CategoryMarkers, InputClip};
use std::path::PathBuf;

/// Default number of same-category clips per block.
pub const DEFAULT_BLOCK_SIZE: usize = 2;

/// Why a clip sits where it does in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSlot {
    /// Mandatory first item, chosen by raw sort order.
    Lead,
    /// Part of a category block.
    Block(Category),
    /// Uncategorized tail.
    Tail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub clip: InputClip,
    pub slot: PlanSlot,
}

/// Ordered sequence of clips to normalize and concatenate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingPlan {
    pub entries: Vec<PlanEntry>,
}

impl ProcessingPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lead(&self) -> Option<&InputClip> {
        self.entries.first().map(|entry| &entry.clip)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.clip.path.clone()).collect()
    }
}

/// Sorts by full path, then stably by sequence key.
///
/// Clips with equal keys keep their lexicographic order.
pub fn sort_clips(clips: &mut [InputClip]) {
    clips.sort_by(|a, b| a.path.cmp(&b.path));
    clips.sort_by_key(|clip| clip.sequence_key);
}

/// Builds the processing plan for a set of discovered clips.
///
/// 1. Sort everything by path, then by sequence key.
/// 2. The first clip becomes the lead regardless of category.
/// 3. The rest split into CategoryA, CategoryB (each sorted by key) and
///    Other (kept in step 1 order).
/// 4. Take up to `block_size` from A, then up to `block_size` from B, until
///    both are drained.
/// 5. Append Other.
///
/// A `block_size` of 0 is treated as 1.
pub fn build_plan(clips: Vec<InputClip>, block_size: usize) -> ProcessingPlan {
    let block_size = block_size.max(1);
    let mut sorted = clips;
    sort_clips(&mut sorted);

    if sorted.is_empty() {
        return ProcessingPlan::default();
    }

    let lead = sorted.remove(0);
    let mut entries = Vec::with_capacity(sorted.len() + 1);
    entries.push(PlanEntry {
        clip: lead,
        slot: PlanSlot::Lead,
    });

    let mut category_a = Vec::new();
    let mut category_b = Vec::new();
    let mut other = Vec::new();
    for clip in sorted {
        match clip.category {
            Category::CategoryA => category_a.push(clip),
            Category::CategoryB => category_b.push(clip),
            Category::Other => other.push(clip),
        }
    }

    category_a.sort_by_key(|clip| clip.sequence_key);
    category_b.sort_by_key(|clip| clip.sequence_key);

    let mut a_blocks = category_a.chunks(block_size);
    let mut b_blocks = category_b.chunks(block_size);
    loop {
        let a = a_blocks.next();
        let b = b_blocks.next();
        if a.is_none() && b.is_none() {
            break;
        }
        for (block, category) in [(a, Category::CategoryA), (b, Category::CategoryB)] {
            for clip in block.unwrap_or_default() {
                entries.push(PlanEntry {
                    clip: clip.clone(),
                    slot: PlanSlot::Block(category),
                });
            }
        }
    }

    entries.extend(other.into_iter().map(|clip| PlanEntry {
        clip,
        slot: PlanSlot::Tail,
    }));

    ProcessingPlan { entries }
}

/// Classifies `paths` and builds the plan in one go.
pub fn plan_paths(paths: Vec<PathBuf>, markers: &CategoryMarkers, block_size: usize) -> ProcessingPlan {
    let clips = paths
        .into_iter()
        .map(|path| InputClip::new(path, markers))
        .collect();
    build_plan(clips, block_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plan_names(names: &[&str]) -> Vec<String> {
        let paths = names.iter().map(|n| PathBuf::from(format!("/in/{}", n))).collect();
        plan_paths(paths, &CategoryMarkers::default(), DEFAULT_BLOCK_SIZE)
            .entries
            .iter()
            .map(|e| e.clip.file_name())
            .collect()
    }

    #[test]
    fn test_empty_discovery_gives_empty_plan() {
        let plan = build_plan(vec![], DEFAULT_BLOCK_SIZE);
        assert!(plan.is_empty());
        assert!(plan.lead().is_none());
    }

    #[test]
    fn test_single_clip_is_lead_only() {
        let plan = plan_paths(
            vec![PathBuf::from("/in/Pic S.1.mp4")],
            &CategoryMarkers::default(),
            DEFAULT_BLOCK_SIZE,
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].slot, PlanSlot::Lead);
    }

    #[test]
    fn test_lead_then_interleave_then_other() {
        let order = plan_names(&["Uni_001.mp4", "Pic_001.mp4", "Extra.mp4", "A.mp4"]);
        assert_eq!(order, vec!["A.mp4", "Pic_001.mp4", "Uni_001.mp4", "Extra.mp4"]);
    }

    #[test]
    fn test_example_three_clips() {
        let order = plan_names(&["Pic_001.mp4", "A.mp4", "Uni_001.mp4"]);
        assert_eq!(order, vec!["A.mp4", "Pic_001.mp4", "Uni_001.mp4"]);
    }

    #[test]
    fn test_blocks_of_two_with_uneven_lengths() {
        let order = plan_names(&[
            "Intro S.0.mp4",
            "Pic S.1.mp4",
            "Pic S.2.mp4",
            "Pic S.3.mp4",
            "Pic S.4.mp4",
            "Pic S.5.mp4",
            "Uni S.1.mp4",
        ]);
        assert_eq!(
            order,
            vec![
                "Intro S.0.mp4",
                "Pic S.1.mp4",
                "Pic S.2.mp4",
                "Uni S.1.mp4",
                "Pic S.3.mp4",
                "Pic S.4.mp4",
                "Pic S.5.mp4",
            ]
        );
    }

    #[test]
    fn test_numeric_not_lexicographic_within_category() {
        let order = plan_names(&["Lead.mp4", "Uni S.10.mp4", "Uni S.9.mp4", "Uni S.2.mp4"]);
        // "Lead.mp4" keys as 0 so it leads; the uni clips follow by number.
        assert_eq!(order, vec!["Lead.mp4", "Uni S.2.mp4", "Uni S.9.mp4", "Uni S.10.mp4"]);
    }

    #[test]
    fn test_lead_is_chosen_regardless_of_category() {
        let order = plan_names(&["Uni S.1.mp4", "Pic S.2.mp4", "Zeta S.3.mp4"]);
        assert_eq!(order[0], "Uni S.1.mp4");
    }

    #[test]
    fn test_unkeyed_clip_takes_lead() {
        // Unkeyed clips key as 0, ahead of keyed ones.
        let order = plan_names(&["A S.1.mp4", "Pic S.5.mp4", "Pic cover.mp4"]);
        assert_eq!(order, vec!["Pic cover.mp4", "Pic S.5.mp4", "A S.1.mp4"]);
    }

    #[test]
    fn test_only_one_category_present() {
        let order = plan_names(&["A.mp4", "Uni S.1.mp4", "Uni S.2.mp4", "Uni S.3.mp4"]);
        assert_eq!(order, vec!["A.mp4", "Uni S.1.mp4", "Uni S.2.mp4", "Uni S.3.mp4"]);
    }

    #[test]
    fn test_other_keeps_sorted_discovery_order() {
        let order = plan_names(&["0lead.mp4", "b S.2.mp4", "c S.1.mp4", "a.mp4"]);
        assert_eq!(order, vec!["0lead.mp4", "a.mp4", "c S.1.mp4", "b S.2.mp4"]);
    }

    #[test]
    fn test_block_size_zero_behaves_as_one() {
        let paths = ["L.mp4", "Pic S.1.mp4", "Pic S.2.mp4", "Uni S.1.mp4", "Uni S.2.mp4"]
            .iter()
            .map(|n| PathBuf::from(format!("/in/{}", n)))
            .collect();
        let plan = plan_paths(paths, &CategoryMarkers::default(), 0);
        let order: Vec<String> = plan.entries.iter().map(|e| e.clip.file_name()).collect();
        assert_eq!(
            order,
            vec!["L.mp4", "Pic S.1.mp4", "Uni S.1.mp4", "Pic S.2.mp4", "Uni S.2.mp4"]
        );
    }

    fn clip_name_strategy() -> impl Strategy<Value = String> {
        (
            prop_oneof![Just("Pic"), Just("Uni"), Just("Other"), Just("pIc"), Just("UNI")],
            prop::option::of(0u32..50),
            "[a-z]{0,3}",
        )
            .prop_map(|(marker, key, suffix)| match key {
                Some(k) => format!("{} S.{:03}{}.mp4", marker, k, suffix),
                None => format!("{}{}.mp4", marker, suffix),
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_plan_is_permutation(
            names in prop::collection::hash_set(clip_name_strategy(), 0..20),
            block_size in 1usize..4,
        ) {
            let paths: Vec<PathBuf> = names.iter().map(|n| PathBuf::from(format!("/in/{}", n))).collect();
            let plan = plan_paths(paths.clone(), &CategoryMarkers::default(), block_size);

            let mut planned = plan.paths();
            planned.sort();
            let mut expected = paths;
            expected.sort();
            prop_assert_eq!(planned, expected);
        }

        #[test]
        fn prop_lead_is_first_sorted_clip(
            names in prop::collection::hash_set(clip_name_strategy(), 1..20),
        ) {
            let markers = CategoryMarkers::default();
            let mut clips: Vec<InputClip> = names
                .iter()
                .map(|n| InputClip::new(PathBuf::from(format!("/in/{}", n)), &markers))
                .collect();
            let plan = build_plan(clips.clone(), DEFAULT_BLOCK_SIZE);
            sort_clips(&mut clips);

            prop_assert_eq!(plan.lead(), clips.first());
            prop_assert_eq!(plan.entries[0].slot, PlanSlot::Lead);
        }

        #[test]
        fn prop_blocks_respect_size_and_tail_is_last(
            names in prop::collection::hash_set(clip_name_strategy(), 0..20),
            block_size in 1usize..4,
        ) {
            let paths: Vec<PathBuf> = names.iter().map(|n| PathBuf::from(format!("/in/{}", n))).collect();
            let plan = plan_paths(paths, &CategoryMarkers::default(), block_size);

            let mut blocks = Vec::new();
            let mut seen_tail = false;
            for entry in plan.entries.iter().skip(1) {
                match entry.slot {
                    PlanSlot::Block(category) => {
                        prop_assert!(!seen_tail, "block entry after tail");
                        prop_assert_eq!(category, entry.clip.category);
                        blocks.push(category);
                    }
                    PlanSlot::Tail => {
                        seen_tail = true;
                        prop_assert_eq!(entry.clip.category, Category::Other);
                    }
                    PlanSlot::Lead => prop_assert!(false, "lead appears twice"),
                }
            }

            // A run longer than one block is only allowed once the other
            // category is drained.
            let mut start = 0;
            while start < blocks.len() {
                let category = blocks[start];
                let mut end = start;
                while end < blocks.len() && blocks[end] == category {
                    end += 1;
                }
                if end - start > block_size {
                    prop_assert!(blocks[end..].iter().all(|c| *c == category));
                    prop_assert!(blocks[start + block_size..].iter().all(|c| *c == category));
                }
                start = end;
            }
        }

        #[test]
        fn prop_category_order_is_by_key(
            names in prop::collection::hash_set(clip_name_strategy(), 0..20),
        ) {
            let paths: Vec<PathBuf> = names.iter().map(|n| PathBuf::from(format!("/in/{}", n))).collect();
            let plan = plan_paths(paths, &CategoryMarkers::default(), DEFAULT_BLOCK_SIZE);

            for category in [Category::CategoryA, Category::CategoryB] {
                let keys: Vec<u64> = plan
                    .entries
                    .iter()
                    .filter(|e| e.slot == PlanSlot::Block(category))
                    .map(|e| e.clip.sequence_key)
                    .collect();
                let mut sorted = keys.clone();
                sorted.sort();
                prop_assert_eq!(keys, sorted);
            }
        }
    }
}
