/// End-to-end forest scenarios: inventory in, weighted and queryable forest out.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use callforest::config::ForestConfig;
use callforest::domain::builder::{BuildConfig, TreeBuilder};
use callforest::domain::entry_point::{EntryPoint, RootKind};
use callforest::domain::forest::Forest;
use callforest::domain::ids::ContentHashIds;
use callforest::domain::layer::{BusinessDomain, LayerType};
use callforest::domain::model::{
    CallEdge, ClassEntity, ClassSeed, CodeGraph, Inventory, MethodEntity, MethodSeed,
};
use callforest::domain::resolver::ImplementationIndex;
use callforest::domain::weight::WeightCalculator;
use callforest::infrastructure::JsonInventorySource;
use callforest::ForestPipeline;

const A: &str = "com.shop.web.OrderController#create(CreateOrderRequest)";
const D: &str = "com.shop.web.AdminController#reorder(Long)";
const B: &str = "com.shop.service.OrderService#placeOrder(Order)";
const C: &str = "com.shop.dao.OrderDao#saveOrder(Order)";

/// A -> B -> C and D -> C.
fn abcd_inventory() -> Inventory {
    Inventory {
        classes: vec![
            ClassSeed::new("com.shop.web.OrderController")
                .annotated("@RestController")
                .method(MethodSeed::public("create").params(&["CreateOrderRequest"])),
            ClassSeed::new("com.shop.web.AdminController")
                .annotated("@RestController")
                .method(MethodSeed::public("reorder").params(&["Long"])),
            ClassSeed::new("com.shop.service.OrderService")
                .annotated("@Service")
                .method(MethodSeed::public("placeOrder").params(&["Order"])),
            ClassSeed::new("com.shop.dao.OrderDao")
                .annotated("@Repository")
                .method(MethodSeed::public("saveOrder").params(&["Order"])),
        ],
        edges: vec![CallEdge::new(A, B), CallEdge::new(B, C), CallEdge::new(D, C)],
    }
}

#[test]
fn test_shared_persistence_method_spans_two_trees() {
    let analysis = ForestPipeline::default().run(&abcd_inventory()).unwrap();

    assert_eq!(analysis.forest.trees.len(), 2);
    let roots: BTreeSet<&str> =
        analysis.forest.trees.iter().map(|t| t.root_method_id.as_str()).collect();
    assert_eq!(roots, BTreeSet::from([A, D]));

    let c = analysis.graph.method(C).unwrap();
    assert_eq!(c.cross_count, 2);
    assert!(!c.is_root_node);

    let queries = analysis.queries();
    let paths = queries.core_paths_of(C);
    assert_eq!(paths.len(), 2);
    let path_roots: BTreeSet<&str> = paths.iter().map(|p| p.root_method_id.as_str()).collect();
    assert_eq!(path_roots, BTreeSet::from([A, D]));
    let via_service = paths.iter().find(|p| p.root_method_id == A).unwrap();
    assert_eq!(via_service.nodes, vec![A, B, C]);

    assert_eq!(queries.trees_containing(C).len(), 2);
    assert!(analysis.validation.is_valid());
    let domains: HashMap<&str, BusinessDomain> = analysis
        .forest
        .trees
        .iter()
        .map(|t| (t.root_method_id.as_str(), t.business_domain))
        .collect();
    assert_eq!(domains[A], BusinessDomain::Order);
    assert_eq!(domains[D], BusinessDomain::System);
}

#[test]
fn test_interface_call_reaches_implementation() {
    let repo_save = "com.shop.dao.Repo#save(Order)";
    let impl_save = "com.shop.dao.RepoImpl#save(Order)";
    let inventory = Inventory {
        classes: vec![
            ClassSeed::new("com.shop.web.OrderController")
                .annotated("@RestController")
                .method(MethodSeed::public("submit").params(&["SubmitOrderRequest"])),
            ClassSeed::new("com.shop.dao.Repo")
                .interface()
                .method(MethodSeed::public("save").params(&["Order"]).abstract_method()),
            ClassSeed::new("com.shop.dao.RepoImpl")
                .implements("Repo")
                .method(MethodSeed::public("save").params(&["Order"])),
        ],
        edges: vec![CallEdge::new(
            "com.shop.web.OrderController#submit(SubmitOrderRequest)",
            repo_save,
        )],
    };

    let analysis = ForestPipeline::default().run(&inventory).unwrap();
    assert_eq!(analysis.mappings.len(), 1);
    assert_eq!(analysis.mappings[0].implementation_method_id, impl_save);

    let memberships = analysis.queries().trees_containing(impl_save);
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].depth, 2);
    let paths = analysis.queries().core_paths_of(impl_save);
    assert_eq!(paths[0].nodes[1], repo_save);
}

#[test]
fn test_self_call_appears_once() {
    let e = "com.shop.service.OrderService#recalculate(Order)";
    let inventory = Inventory {
        classes: vec![
            ClassSeed::new("com.shop.web.OrderController")
                .annotated("@RestController")
                .method(MethodSeed::public("refresh").params(&["RefreshRequest"])),
            ClassSeed::new("com.shop.service.OrderService")
                .annotated("@Service")
                .method(MethodSeed::public("recalculate").params(&["Order"])),
        ],
        edges: vec![
            CallEdge::new("com.shop.web.OrderController#refresh(RefreshRequest)", e),
            CallEdge::new(e, e),
        ],
    };

    let analysis = ForestPipeline::default().run(&inventory).unwrap();
    let tree = &analysis.forest.trees[0];
    assert_eq!(tree.node_count, 2);
    assert_eq!(tree.cycle_count, 1);
    assert_eq!(analysis.forest.relations.len(), 1);
    assert_eq!(analysis.forest.relations[0].depth, 1);
    assert_eq!(analysis.graph.method(e).unwrap().cross_count, 1);
}

#[test]
fn test_self_calling_root_is_not_its_own_child() {
    let root = "com.shop.web.OrderController#poll(PollRequest)";
    let inventory = Inventory {
        classes: vec![ClassSeed::new("com.shop.web.OrderController")
            .annotated("@RestController")
            .method(MethodSeed::public("poll").params(&["PollRequest"]))],
        edges: vec![CallEdge::new(root, root)],
    };
    let analysis = ForestPipeline::default().run(&inventory).unwrap();
    assert_eq!(analysis.forest.trees.len(), 1);
    assert_eq!(analysis.forest.trees[0].node_count, 1);
    assert!(analysis.forest.relations.is_empty());
    assert!(analysis.graph.method(root).unwrap().is_root_node);
}

// ============================================================================
// Properties over a generated graph
// ============================================================================

/// Deterministic pseudo-random graph with cycles, self-calls and shared nodes.
fn generated_graph(controllers: usize, services: usize, seed: u64) -> (CodeGraph, Vec<EntryPoint>) {
    let mut state = seed;
    let mut next = move |bound: usize| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % bound
    };

    let entity =
        |name: &str, layer, domain| ClassEntity::from_seed(&ClassSeed::new(name), layer, domain);
    let ctl = entity("gen.web.Ctl", LayerType::Entry, BusinessDomain::Order);
    let svc = entity("gen.svc.Svc", LayerType::Service, BusinessDomain::Payment);
    let dao = entity("gen.dao.Dao", LayerType::Persistence, BusinessDomain::Order);

    let mut methods = Vec::new();
    let mut roots = Vec::new();
    for i in 0..controllers {
        let m = MethodEntity::from_seed(&ctl.id, &MethodSeed::public(&format!("handle{}", i)));
        roots.push(EntryPoint {
            method_id: m.id.clone(),
            class_id: ctl.id.clone(),
            name: m.name.clone(),
            kind: RootKind::BoundaryAnnotation,
        });
        methods.push(m);
    }
    for i in 0..services {
        methods.push(MethodEntity::from_seed(&svc.id, &MethodSeed::public(&format!("run{}", i))));
        methods.push(MethodEntity::from_seed(&dao.id, &MethodSeed::public(&format!("save{}", i))));
    }

    let svc_id = |i: usize| format!("gen.svc.Svc#run{}()", i);
    let dao_id = |i: usize| format!("gen.dao.Dao#save{}()", i);
    let mut edges = Vec::new();
    for i in 0..controllers {
        let from = format!("gen.web.Ctl#handle{}()", i);
        for _ in 0..3 {
            edges.push(CallEdge::new(&from, &svc_id(next(services))));
        }
        // Calls into another root are never followed.
        edges.push(CallEdge::new(&from, &format!("gen.web.Ctl#handle{}()", next(controllers))));
    }
    for i in 0..services {
        for _ in 0..3 {
            edges.push(CallEdge::new(&svc_id(i), &svc_id(next(services))));
        }
        edges.push(CallEdge::new(&svc_id(i), &dao_id(next(services))));
        edges.push(CallEdge::new(&dao_id(i), &dao_id(i)));
    }

    (CodeGraph::new(vec![ctl, svc, dao], methods, edges), roots)
}

fn build(graph: &CodeGraph, roots: &[EntryPoint], max_depth: usize, parallel: bool) -> Forest {
    let builder = TreeBuilder::new(
        BuildConfig {
            max_depth,
            parallel,
            ..BuildConfig::default()
        },
        Arc::new(ContentHashIds),
    );
    builder.build(graph, &ImplementationIndex::default(), roots)
}

#[test]
fn test_every_tree_is_acyclic_with_single_parents() {
    let (graph, roots) = generated_graph(12, 40, 7);
    let forest = build(&graph, &roots, 6, true);
    assert_eq!(forest.trees.len(), 12);

    for tree in &forest.trees {
        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for relation in forest.relations_of(&tree.id) {
            assert!(
                parent_of.insert(&relation.child_method_id, &relation.parent_method_id).is_none(),
                "{} has two parents in {}",
                relation.child_method_id,
                tree.id
            );
            assert_ne!(relation.child_method_id, tree.root_method_id);
        }
        // Walking up from any node reaches the root without revisiting.
        for start in parent_of.keys() {
            let mut seen = HashSet::new();
            let mut cursor = *start;
            while let Some(&parent) = parent_of.get(cursor) {
                assert!(seen.insert(cursor), "cycle through {}", cursor);
                cursor = parent;
            }
            assert_eq!(cursor, tree.root_method_id);
        }
    }
}

#[test]
fn test_depth_bound_and_root_exclusivity() {
    let (graph, roots) = generated_graph(10, 30, 11);
    let root_ids: HashSet<&str> = roots.iter().map(|r| r.method_id.as_str()).collect();
    for max_depth in [1, 2, 4] {
        let forest = build(&graph, &roots, max_depth, false);
        assert!(forest.relations.iter().all(|r| r.depth <= max_depth));
        assert!(forest.trees.iter().all(|t| t.max_depth <= max_depth));
        assert!(forest
            .relations
            .iter()
            .all(|r| !root_ids.contains(r.child_method_id.as_str())));
    }
}

#[test]
fn test_cross_count_matches_tree_membership() {
    let (mut graph, roots) = generated_graph(8, 25, 3);
    let forest = build(&graph, &roots, 10, true);
    WeightCalculator::new().recompute(&mut graph, &forest);

    let mut expected: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for tree in &forest.trees {
        expected.entry(&tree.root_method_id).or_default().insert(&tree.id);
    }
    for relation in &forest.relations {
        expected.entry(&relation.parent_method_id).or_default().insert(&relation.tree_id);
        expected.entry(&relation.child_method_id).or_default().insert(&relation.tree_id);
    }
    for method in graph.methods() {
        let count = expected.get(method.id.as_str()).map(BTreeSet::len).unwrap_or(0);
        assert_eq!(method.cross_count, count, "cross count of {}", method.id);
    }
}

#[test]
fn test_core_path_layer_weight_is_monotone() {
    let (graph, roots) = generated_graph(6, 20, 5);
    let forest = build(&graph, &roots, 8, false);
    let by_target: HashMap<(&str, &str), f64> = forest
        .core_paths
        .iter()
        .map(|p| ((p.tree_id.as_str(), p.from_method_id.as_str()), p.layer_weight))
        .collect();

    for path in &forest.core_paths {
        assert_eq!(path.nodes.len(), path.path_length + 1);
        assert_eq!(path.nodes.first().map(String::as_str), Some(path.root_method_id.as_str()));
        // The prefix ending one hop earlier is itself a core path, unless it is the root.
        if path.path_length > 1 {
            let parent = path.nodes[path.nodes.len() - 2].as_str();
            let prefix_weight = by_target[&(path.tree_id.as_str(), parent)];
            assert!(path.layer_weight >= prefix_weight);
        }
    }
}

#[test]
fn test_weights_are_idempotent_and_builds_deterministic() {
    let (mut graph, roots) = generated_graph(9, 30, 21);
    let parallel = build(&graph, &roots, 10, true);
    let sequential = build(&graph, &roots, 10, false);
    assert_eq!(parallel, sequential);

    let calc = WeightCalculator::new();
    let first = calc.recompute(&mut graph, &parallel);
    let snapshot = |graph: &CodeGraph| -> Vec<(String, usize, f64)> {
        graph.methods().map(|m| (m.id.clone(), m.cross_count, m.weight)).collect()
    };
    let weights = snapshot(&graph);
    let second = calc.recompute(&mut graph, &parallel);
    let again = snapshot(&graph);
    assert_eq!(first, second);
    assert_eq!(weights, again);
    assert!(graph.methods().all(|m| m.weight >= 0.0));
    assert!(graph.classes().all(|c| c.weight >= 0.0));
}

#[test]
fn test_sequence_ids_from_config() {
    let config =
        ForestConfig::from_toml_str("id_strategy = \"sequence\"\n[build]\nparallel = false")
            .unwrap();
    let analysis = ForestPipeline::new(config).run(&abcd_inventory()).unwrap();
    let mut ids: Vec<&str> = analysis.forest.trees.iter().map(|t| t.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["tree-000001", "tree-000004"]);
}

#[test]
fn test_controller_reaches_service_in_domain_package() {
    let create = "com.shop.web.OrderController#create(Order)";
    let place = "com.shop.domain.OrderService#place(Order)";
    let inventory = Inventory {
        classes: vec![
            ClassSeed::new("com.shop.web.OrderController")
                .annotated("@RestController")
                .method(MethodSeed::public("create").params(&["Order"])),
            ClassSeed::new("com.shop.domain.OrderService")
                .method(MethodSeed::public("place").params(&["Order"])),
        ],
        edges: vec![CallEdge::new(create, place)],
    };
    let analysis = ForestPipeline::default().run(&inventory).unwrap();

    assert_eq!(analysis.dropped_edges, 0);
    assert_eq!(analysis.forest.trees.len(), 1);
    assert_eq!(analysis.forest.relations.len(), 1);
    assert_eq!(analysis.forest.relations[0].child_method_id, place);
    assert_eq!(analysis.graph.layer_of(place), LayerType::Service);
}

#[test]
fn test_spaced_generic_signature_edge_is_linked() {
    let submit = "com.shop.web.BatchController#submit(Map<String,Order>)";
    let inventory = Inventory {
        classes: vec![
            ClassSeed::new("com.shop.web.BatchController")
                .annotated("@RestController")
                .method(MethodSeed::public("submit").params(&["Map<String, Order>"])),
            ClassSeed::new("com.shop.service.BatchService")
                .annotated("@Service")
                .method(MethodSeed::public("place").params(&["Map<String, Order>"])),
        ],
        edges: vec![CallEdge::new(
            "com.shop.web.BatchController#submit(Map<String, Order>)",
            "com.shop.service.BatchService#place(Map<String, Order>)",
        )],
    };
    let analysis = ForestPipeline::default().run(&inventory).unwrap();

    assert_eq!(analysis.dropped_edges, 0);
    assert_eq!(analysis.forest.relations.len(), 1);
    let queries = analysis.queries();
    let paths = queries.core_paths_of("com.shop.service.BatchService#place(Map<String,Order>)");
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].root_method_id, submit);
}

#[test]
fn test_out_of_range_confidence_is_clamped_before_the_floor() {
    let inventory = JsonInventorySource::parse(
        r#"{
            "classes": [
                {
                    "qualified_name": "com.shop.web.OrderController",
                    "annotations": ["@RestController"],
                    "methods": [
                        {"name": "create", "visibility": "public", "parameter_types": ["Order"]}
                    ]
                },
                {
                    "qualified_name": "com.shop.service.OrderService",
                    "annotations": ["@Service"],
                    "methods": [
                        {"name": "place", "visibility": "public", "parameter_types": ["Order"]},
                        {"name": "audit", "visibility": "public", "parameter_types": ["Order"]}
                    ]
                }
            ],
            "edges": [
                {
                    "from": "com.shop.web.OrderController#create(Order)",
                    "to": "com.shop.service.OrderService#place(Order)",
                    "confidence": 7.5
                },
                {
                    "from": "com.shop.web.OrderController#create(Order)",
                    "to": "com.shop.service.OrderService#audit(Order)",
                    "confidence": -3
                }
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(inventory.edges[0].confidence, 1.0);
    assert_eq!(inventory.edges[1].confidence, 0.0);

    let config = ForestConfig::from_toml_str("[build]\nmin_edge_confidence = 0.5").unwrap();
    let analysis = ForestPipeline::new(config).run(&inventory).unwrap();
    assert_eq!(analysis.dropped_edges, 1);
    let children: Vec<&str> =
        analysis.forest.relations.iter().map(|r| r.child_method_id.as_str()).collect();
    assert_eq!(children, vec!["com.shop.service.OrderService#place(Order)"]);
}
