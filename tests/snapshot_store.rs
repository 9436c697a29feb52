use callforest::domain::model::{CallEdge, ClassSeed, Inventory, MethodSeed};
use callforest::domain::query::TreeQueryService;
use callforest::domain::store::{DiskForestStore, ForestStore};
use callforest::ForestPipeline;
use tempfile::tempdir;

const SAVE: &str = "com.shop.dao.OrderDao#save(Order)";

fn inventory() -> Inventory {
    Inventory {
        classes: vec![
            ClassSeed::new("com.shop.web.OrderController")
                .annotated("@RestController")
                .method(MethodSeed::public("create").params(&["CreateOrderRequest"]))
                .method(MethodSeed::public("cancel").params(&["Long"])),
            ClassSeed::new("com.shop.service.OrderService")
                .annotated("@Service")
                .method(MethodSeed::public("place").params(&["Order"]))
                .method(MethodSeed::public("revoke").params(&["Long"])),
            ClassSeed::new("com.shop.dao.OrderDao")
                .annotated("@Repository")
                .method(MethodSeed::public("save").params(&["Order"])),
        ],
        edges: vec![
            CallEdge::new(
                "com.shop.web.OrderController#create(CreateOrderRequest)",
                "com.shop.service.OrderService#place(Order)",
            ),
            CallEdge::new(
                "com.shop.web.OrderController#cancel(Long)",
                "com.shop.service.OrderService#revoke(Long)",
            ),
            CallEdge::new("com.shop.service.OrderService#place(Order)", SAVE),
            CallEdge::new("com.shop.service.OrderService#revoke(Long)", SAVE),
        ],
    }
}

#[test]
fn test_snapshot_survives_reopen() {
    let dir = tempdir().unwrap();
    let analysis = ForestPipeline::default().run(&inventory()).unwrap();
    assert_eq!(analysis.forest.trees.len(), 2);

    {
        let store = DiskForestStore::open(dir.path()).unwrap();
        store.save("nightly", &analysis.snapshot()).unwrap();
    }

    let store = DiskForestStore::open(dir.path()).unwrap();
    assert_eq!(store.names().unwrap(), vec!["nightly".to_string()]);
    let (graph, forest) = store.load("nightly").unwrap().unwrap().restore();
    assert_eq!(forest, analysis.forest);

    let live = analysis.queries();
    let restored = TreeQueryService::new(&graph, &forest);
    assert_eq!(restored.trees_containing(SAVE), live.trees_containing(SAVE));
    assert_eq!(restored.core_paths_of(SAVE), live.core_paths_of(SAVE));
    assert_eq!(restored.forest_overview(), live.forest_overview());

    // Weights travel with the snapshot.
    let save = graph.method(SAVE).unwrap();
    assert_eq!(save.cross_count, 2);
    assert_eq!(save.weight, analysis.graph.method(SAVE).unwrap().weight);
}

#[test]
fn test_missing_and_removed_snapshots() {
    let dir = tempdir().unwrap();
    let store = DiskForestStore::open(dir.path()).unwrap();
    assert!(store.load("absent").unwrap().is_none());

    let analysis = ForestPipeline::default().run(&inventory()).unwrap();
    store.save("a", &analysis.snapshot()).unwrap();
    store.save("b", &analysis.snapshot()).unwrap();
    assert!(store.remove("a").unwrap());
    assert!(!store.remove("a").unwrap());
    assert_eq!(store.names().unwrap(), vec!["b".to_string()]);
}
