//! Integration tests for directory resolution and classification.
//!
//! A scripted naming service serves bindings through the mock transport;
//! the tests check that bindings land as the right node kinds, that stale
//! references are skipped without aborting, and that pagination honors the
//! injected options.

use std::sync::Arc;

use nstree::{Error, NodeKind, Options, Tree};
use nstree_testing::{init_tracing, MockComponent, MockManager, MockTransport, NarrowFailure};

const ADDR: &str = "localhost:2809";

fn build_tree(transport: Arc<MockTransport>) -> Tree {
    Tree::builder()
        .server(ADDR)
        .build(transport)
        .expect("tree builds against mock transport")
}

#[test]
fn test_classifies_bindings_into_node_kinds() {
    init_tracing();
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    let sub = context.bind_context("sub", "ctx");
    sub.bind_component("motor0", &Arc::new(MockComponent::new("motor0")));
    context.bind_manager("manager", &Arc::new(MockManager::new("manager")));
    context.bind_opaque("blob", "dat");

    let tree = build_tree(transport);

    assert!(tree.is_nameserver(&["/", ADDR]));
    assert!(tree.is_directory(&["/", ADDR, "sub.ctx"]));
    assert!(tree.is_component(&["/", ADDR, "sub.ctx", "motor0.cmp"]));
    assert!(tree.is_manager(&["/", ADDR, "manager.mgr"]));
    assert_eq!(
        tree.kind_at(&["/", ADDR, "blob.dat"]),
        Some(NodeKind::UnknownLeaf)
    );

    // The unknown leaf still exposes its resolved reference.
    let blob = tree.get_node(&["/", ADDR, "blob.dat"]).unwrap();
    assert!(blob.as_object().is_some());
}

#[test]
fn test_zombie_and_transient_bindings_are_skipped() {
    init_tracing();
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    context.bind_context("sub", "ctx");
    context.bind_broken("ghost", "cmp", NarrowFailure::ObjectNotExist);
    context.bind_broken("flaky", "cmp", NarrowFailure::Transient);

    let zombie_manager = Arc::new(MockManager::new("zombie"));
    zombie_manager.fail_profile(NarrowFailure::ObjectNotExist);
    context.bind_manager("zombie", &zombie_manager);

    let live = Arc::new(MockComponent::new("live"));
    context.bind_component("live", &live);

    // Resolution completes despite the dead bindings.
    let tree = build_tree(transport);

    assert!(tree.has_path(&["/", ADDR, "sub.ctx"]));
    assert!(tree.has_path(&["/", ADDR, "live.cmp"]));
    assert!(!tree.has_path(&["/", ADDR, "ghost.cmp"]));
    assert!(!tree.has_path(&["/", ADDR, "flaky.cmp"]));
    assert!(!tree.has_path(&["/", ADDR, "zombie.mgr"]));
}

#[test]
fn test_unexpected_narrow_failure_aborts_resolution() {
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    // Tagged as a component but narrows to nothing: a type mismatch is not
    // a zombie and must propagate.
    context.bind_opaque("odd", "cmp");

    let err = Tree::builder()
        .server(ADDR)
        .build(transport)
        .expect_err("type mismatch aborts resolution");
    assert!(matches!(err, Error::Transport(_)));
}

#[test]
fn test_pagination_fetches_every_page_and_destroys_the_cursor() {
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    for i in 0..25 {
        let name = format!("c{i:02}");
        context.bind_component(&name, &Arc::new(MockComponent::new(name.clone())));
    }

    let options = Options::new();
    options.set(Options::MAX_BINDINGS, 10u64);
    let tree = Tree::builder()
        .server(ADDR)
        .options(options)
        .build(transport.clone())
        .unwrap();

    let server = tree.get_node(&["/", ADDR]).unwrap();
    assert_eq!(server.children().len(), 25);

    // One listing plus three cursor fetches (10 + 10 + 5 + empty), then the
    // cursor is released.
    assert_eq!(context.page_requests(), vec![10, 10, 10, 10]);
    assert_eq!(context.destroyed_cursors(), 1);

    // A mutated page size is observed by the very next reparse; everything
    // fits in one page so no cursor is needed.
    tree.options().set(Options::MAX_BINDINGS, 100u64);
    server.as_directory().unwrap().reparse().unwrap();
    assert_eq!(context.page_requests().last(), Some(&100));
    assert_eq!(context.destroyed_cursors(), 1);
    assert_eq!(tree.get_node(&["/", ADDR]).unwrap().children().len(), 25);
}

#[test]
fn test_reparse_rebuilds_the_subtree_from_scratch() {
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    context.bind_component("a", &Arc::new(MockComponent::new("a")));

    let tree = build_tree(transport);
    let old_node = tree.get_node(&["/", ADDR, "a.cmp"]).unwrap();

    // A binding added remotely is invisible until a reparse.
    context.bind_component("b", &Arc::new(MockComponent::new("b")));
    assert!(!tree.has_path(&["/", ADDR, "b.cmp"]));

    let server = tree.get_node(&["/", ADDR]).unwrap();
    server.as_directory().unwrap().reparse().unwrap();

    assert!(tree.has_path(&["/", ADDR, "b.cmp"]));
    let new_node = tree.get_node(&["/", ADDR, "a.cmp"]).unwrap();
    // The subtree was rebuilt, not patched: same name, fresh node.
    assert_ne!(old_node, new_node);
}

#[test]
fn test_root_reparse_resynchronizes_every_server() {
    let transport = Arc::new(MockTransport::new());
    let context_a = transport.add_server("a:2809");
    let context_b = transport.add_server("b:2809");

    let tree = Tree::builder()
        .servers(["a:2809", "b:2809"])
        .build(transport)
        .unwrap();

    context_a.bind_component("fresh", &Arc::new(MockComponent::new("fresh")));
    context_b.bind_manager("late", &Arc::new(MockManager::new("late")));

    tree.root().as_directory().unwrap().reparse().unwrap();

    assert!(tree.has_path(&["/", "a:2809", "fresh.cmp"]));
    assert!(tree.has_path(&["/", "b:2809", "late.mgr"]));
}

#[test]
fn test_unbind_issues_remote_removal_without_touching_the_local_tree() {
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    context.bind_component("doomed", &Arc::new(MockComponent::new("doomed")));

    let tree = build_tree(transport);
    let dir = tree.get_node(&["/", ADDR]).unwrap().as_directory().unwrap();

    dir.unbind("doomed.cmp").unwrap();
    assert!(!context.contains("doomed", "cmp"));
    // The mirror is stale until a reparse.
    assert!(tree.has_path(&["/", ADDR, "doomed.cmp"]));

    dir.reparse().unwrap();
    assert!(!tree.has_path(&["/", ADDR, "doomed.cmp"]));

    assert!(matches!(
        dir.unbind("missing.cmp"),
        Err(Error::BadPath(name)) if name == "missing.cmp"
    ));
}

#[test]
fn test_construction_failures_are_distinct() {
    let transport = Arc::new(MockTransport::new());
    transport.add_unnarrowable_server("odd:2809");

    let err = Tree::builder()
        .server("nowhere:2809")
        .build(transport.clone())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidService { ref address } if address == "nowhere:2809"));
    assert!(err.is_construction_error());

    let err = Tree::builder()
        .server("odd:2809")
        .build(transport.clone())
        .unwrap_err();
    assert!(matches!(err, Error::FailedToNarrowRoot { ref address } if address == "odd:2809"));
    assert!(err.is_construction_error());
}

#[test]
fn test_caller_can_keep_a_partial_tree() {
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server("good:2809");
    context.bind_component("c", &Arc::new(MockComponent::new("c")));

    let tree = Tree::builder()
        .server("good:2809")
        .build(transport.clone())
        .unwrap();

    // The second server is down; the caller decides to keep going.
    assert!(tree.add_name_server("down:2809").is_err());
    assert!(tree.has_path(&["/", "good:2809", "c.cmp"]));
    assert!(!tree.has_path(&["/", "down:2809"]));
}
