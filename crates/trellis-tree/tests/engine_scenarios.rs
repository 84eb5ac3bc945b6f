//! Randomized and end-to-end checks over the public engine API.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use trellis_tree::{
    CloneTarget, DropTarget, EngineConfig, InstantiationCloner, MoveDirection, PositionPatch,
    PositionPlanner, PositionPolicy, SequentialIds, SlotFilter, TreeAssembler, integrity, merge,
    path, resolve_instance, template_subtree,
};
use trellis_types::{BlockId, BlockNode, BlockNodeBuilder, Overrides, ReusableBlock, TemplateId, Value};

const SLOTS: [Option<&str>; 3] = [None, Some("left"), Some("right")];

/// A forest where every row's parent appears earlier, so it is acyclic and
/// every row is reachable from the page root.
fn random_forest(rng: &mut StdRng, size: usize) -> Vec<BlockNode> {
    let mut rows: Vec<BlockNode> = Vec::with_capacity(size);
    for i in 0..size {
        let mut builder = BlockNodeBuilder::new(format!("n{i}"), "text")
            .position(rng.gen_range(0..1000) as f64 + i as f64 / 10_000.0);
        if i > 0 && rng.gen_bool(0.8) {
            let parent = rows[rng.gen_range(0..i)].id.clone();
            builder = builder.parent(parent);
            if let Some(slot) = SLOTS[rng.gen_range(0..SLOTS.len())] {
                builder = builder.slot(slot);
            }
        }
        rows.push(builder.build());
    }
    rows.shuffle(rng);
    rows
}

fn apply(rows: &mut [BlockNode], patch: &PositionPatch) {
    for update in patch {
        let Some(row) = rows.iter_mut().find(|r| r.id == update.id) else {
            continue;
        };
        row.position = update.position;
        if let Some(placement) = &update.placement {
            row.parent_block_id = placement.parent_block_id.clone();
            row.slot = placement.slot.clone();
        }
    }
}

fn assert_strictly_ordered(rows: &[BlockNode]) {
    let mut groups: HashMap<_, Vec<f64>> = HashMap::new();
    for row in rows {
        groups.entry(row.sibling_key()).or_default().push(row.position);
    }
    for (key, mut positions) in groups {
        positions.sort_by(f64::total_cmp);
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1], "group {key} not strictly ordered: {positions:?}");
        }
    }
}

#[test]
fn test_assembly_parent_first_and_sorted() {
    let mut rng = StdRng::seed_from_u64(0x7e11);
    for _ in 0..50 {
        let size = rng.gen_range(1..60);
        let rows = random_forest(&mut rng, size);
        let out = TreeAssembler::new(&rows).assemble_page();

        assert_eq!(out.len(), rows.len());

        let mut seen = HashSet::new();
        for entry in &out {
            if let Some(parent) = entry.node.parent() {
                assert!(seen.contains(parent), "{} emitted before its parent", entry.id());
            }
            seen.insert(entry.id().clone());
        }

        // Siblings of each parent appear in position order.
        let mut emitted: HashMap<Option<BlockId>, Vec<f64>> = HashMap::new();
        for entry in &out {
            emitted
                .entry(entry.node.parent().cloned())
                .or_default()
                .push(entry.node.position);
        }
        for positions in emitted.values() {
            assert!(positions.windows(2).all(|p| p[0] <= p[1]), "{positions:?}");
        }
    }
}

#[test]
fn test_reparent_keeps_groups_strictly_ordered() {
    let mut rng = StdRng::seed_from_u64(42);
    for policy in [PositionPolicy::Sparse, PositionPolicy::Renumber] {
        let mut config = EngineConfig::default();
        config.positions.policy = policy;
        let planner = PositionPlanner::new(config.positions.clone());

        let mut rows = random_forest(&mut rng, 30);
        let repair = planner.plan_repair(&rows);
        apply(&mut rows, &repair);
        assert_strictly_ordered(&rows);

        for _ in 0..200 {
            let moved = rows[rng.gen_range(0..rows.len())].clone();
            let parent = if rng.gen_bool(0.2) {
                None
            } else {
                Some(rows[rng.gen_range(0..rows.len())].id.clone())
            };
            let slot = SLOTS[rng.gen_range(0..SLOTS.len())].map(str::to_string);
            let target = DropTarget::new(parent, slot, rng.gen_range(0..8));

            match planner.plan_reparent(&moved, &rows, &target) {
                Ok(patch) => apply(&mut rows, &patch),
                Err(trellis_tree::PlanError::WouldCycle { .. }) => continue,
                Err(other) => panic!("unexpected plan error: {other}"),
            }
            assert_strictly_ordered(&rows);
        }

        assert_eq!(TreeAssembler::new(&rows).assemble_page().len(), rows.len());
        assert!(integrity::check(&rows).is_empty());
    }
}

#[test]
fn test_adjacent_moves_walk_block_to_the_end() {
    let mut rows = vec![BlockNodeBuilder::new("root", "section").build()];
    for (i, position) in [3.0, 1.0, 2.0].into_iter().enumerate() {
        rows.push(
            BlockNodeBuilder::new(format!("c{i}"), "text")
                .parent("root")
                .position(position)
                .build(),
        );
    }

    let order = |rows: &[BlockNode]| -> Vec<String> {
        TreeAssembler::new(rows)
            .children(Some(&BlockId::new("root")), &SlotFilter::Any)
            .iter()
            .map(|n| n.id.to_string())
            .collect()
    };
    assert_eq!(order(&rows), vec!["c1", "c2", "c0"]);

    let planner = PositionPlanner::default();
    loop {
        let node = rows.iter().find(|r| r.id.as_str() == "c1").cloned().unwrap();
        if !planner.can_move_right(&node, &rows) {
            break;
        }
        let patch = planner.plan_move(&node, &rows, MoveDirection::Right).unwrap();
        assert_eq!(patch.len(), 2);
        apply(&mut rows, &patch);
    }
    assert_eq!(order(&rows), vec!["c2", "c0", "c1"]);
}

#[test]
fn test_clone_twice_gives_disjoint_instances() {
    let template = ReusableBlock {
        id: TemplateId::new("tpl"),
        name: "Tabs".into(),
        root_block_id: BlockId::new("tabs"),
        blocks: vec![
            BlockNodeBuilder::new("tabs", "tabs").build(),
            BlockNodeBuilder::new("t1", "text").parent("tabs").slot("tab-1").build(),
            BlockNodeBuilder::new("t2", "text").parent("tabs").slot("tab-2").build(),
        ],
    };
    let cloner = InstantiationCloner::default();
    let mut ids = SequentialIds::new("i");
    let a = cloner.instantiate(&template, &CloneTarget::root(0.0), &mut ids).unwrap();
    let b = cloner.instantiate(&template, &CloneTarget::root(1.0), &mut ids).unwrap();

    let all: HashSet<&BlockId> = a.nodes.iter().chain(&b.nodes).map(|n| &n.id).collect();
    assert_eq!(all.len(), 6);
    assert!(template.blocks.iter().all(|t| !all.contains(&t.id)));

    let mut page: Vec<BlockNode> = a.nodes.clone();
    page.extend(b.nodes.clone());
    let tabs = TreeAssembler::new(&page)
        .children(a.root().map(|r| &r.id), &SlotFilter::Named("tab-2".into()));
    assert_eq!(tabs.len(), 1);
    assert_eq!(a.id_map.source_of(&tabs[0].id), Some(&BlockId::new("t2")));
}

#[test]
fn test_merge_set_then_remove_restores_base() {
    let base = Value::from(json!({"title": "Hi", "style": {"color": "red"}}));
    let overrides = Overrides::new().with("style.color", "blue");
    let merged = merge(Some(&base), Some(&overrides));
    assert_eq!(path::get(&merged, "style.color"), Some(&Value::from("blue")));

    let removed = path::remove(&overrides, "style.color");
    assert!(!path::has(&removed, "style.color"));
    assert_eq!(merge(Some(&base), Some(&removed)), base);
}

#[test]
fn test_resolution_with_degraded_types_keeps_shape() {
    let template = ReusableBlock {
        id: TemplateId::new("tpl"),
        name: String::new(),
        root_block_id: BlockId::new("r"),
        blocks: vec![
            BlockNodeBuilder::new("r", "card").content(json!({"title": "Hi"})).build(),
            BlockNodeBuilder::new("x", "mystery").parent("r").build(),
        ],
    };
    let known = vec!["card"];
    let subtree = TreeAssembler::new(&template.blocks)
        .with_registry(&known)
        .subtree(&template.root_block_id);
    assert!(!subtree[0].degraded);
    assert!(subtree[1].degraded);

    let resolved = resolve_instance(&subtree, &Default::default());
    assert_eq!(resolved.len(), 2);
    assert!(resolved[1].degraded);
    assert_eq!(resolved[1].depth, 1);

    assert_eq!(template_subtree(&template).unwrap().len(), 2);
}
