//! Integration tests for leaf-resource caching, status merging and
//! configuration management.

use std::collections::BTreeMap;
use std::sync::Arc;

use nstree::ports::{Port, PortKind};
use nstree::transport::{ConfigSetData, RemoteLifecycle};
use nstree::{ComponentRef, Error, ManagerRef, ResourceState, Tree};
use nstree_testing::{MockComponent, MockEc, MockManager, MockTransport};

const ADDR: &str = "localhost:2809";

fn port(name: &str, kind: PortKind, connectors: &[&str]) -> Port {
    Port {
        name: name.to_string(),
        kind,
        connectors: connectors.iter().map(|s| s.to_string()).collect(),
        properties: BTreeMap::new(),
    }
}

/// Build a tree holding exactly one component bound as `comp.cmp`.
fn component_fixture(component: &Arc<MockComponent>) -> (Tree, ComponentRef) {
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    context.bind_component("comp", component);

    let tree = Tree::builder().server(ADDR).build(transport).unwrap();
    let comp = tree
        .get_node(&["/", ADDR, "comp.cmp"])
        .unwrap()
        .as_component()
        .unwrap();
    (tree, comp)
}

fn manager_fixture(manager: &Arc<MockManager>) -> (Tree, ManagerRef) {
    let transport = Arc::new(MockTransport::new());
    let context = transport.add_server(ADDR);
    context.bind_manager("manager", manager);

    let tree = Tree::builder().server(ADDR).build(transport).unwrap();
    let mgr = tree
        .get_node(&["/", ADDR, "manager.mgr"])
        .unwrap()
        .as_manager()
        .unwrap();
    (tree, mgr)
}

/// 2 owned + 3 participating contexts with distinct handle ids.
fn component_with_contexts() -> (Arc<MockComponent>, Vec<Arc<MockEc>>, Vec<Arc<MockEc>>) {
    let component = Arc::new(MockComponent::new("comp"));
    let owned: Vec<Arc<MockEc>> = (1..=2).map(|id| Arc::new(MockEc::new(id))).collect();
    let participating: Vec<Arc<MockEc>> = (10..=12).map(|id| Arc::new(MockEc::new(id))).collect();
    for ec in &owned {
        component.add_owned(Arc::clone(ec));
    }
    for ec in &participating {
        component.add_participating(Arc::clone(ec));
    }
    (component, owned, participating)
}

#[test]
fn test_ec_index_rebases_into_participating() {
    let (component, owned, participating) = component_with_contexts();
    let (_tree, comp) = component_fixture(&component);

    // Index 1 lands in owned[1].
    comp.activate_in_ec(1).unwrap();
    assert_eq!(owned[1].activations(), 1);
    assert_eq!(participating[0].activations(), 0);

    // Index 4 rebases into participating[2].
    comp.activate_in_ec(4).unwrap();
    assert_eq!(participating[2].activations(), 1);

    // Index 5 is past both lists.
    assert!(matches!(comp.activate_in_ec(5), Err(Error::BadEcIndex(5))));
    assert!(matches!(comp.state_in_ec(5), Err(Error::BadEcIndex(5))));
}

#[test]
fn test_deactivate_and_reset_address_the_same_sequence() {
    let (component, owned, participating) = component_with_contexts();
    let (_tree, comp) = component_fixture(&component);

    comp.deactivate_in_ec(0).unwrap();
    assert_eq!(owned[0].deactivations(), 1);

    comp.reset_in_ec(2).unwrap();
    assert_eq!(participating[0].resets(), 1);
}

#[test]
fn test_status_merge_is_worst_status_wins() {
    let (component, owned, participating) = component_with_contexts();
    owned[0].set_state(RemoteLifecycle::Active);
    owned[1].set_state(RemoteLifecycle::Inactive);
    participating[0].set_state(RemoteLifecycle::Error);
    participating[1].set_state(RemoteLifecycle::Inactive);
    participating[2].set_state(RemoteLifecycle::Inactive);

    let (_tree, comp) = component_fixture(&component);
    assert_eq!(comp.state().unwrap(), ResourceState::Error);
}

#[test]
fn test_component_without_contexts_is_unknown() {
    let component = Arc::new(MockComponent::new("comp"));
    let (_tree, comp) = component_fixture(&component);

    assert_eq!(comp.state().unwrap(), ResourceState::Unknown);
    assert!(!comp.alive().unwrap());
}

#[test]
fn test_single_inactive_context_is_inactive() {
    let component = Arc::new(MockComponent::new("comp"));
    let ec = Arc::new(MockEc::new(1));
    ec.set_state(RemoteLifecycle::Inactive);
    component.add_owned(ec);

    let (_tree, comp) = component_fixture(&component);
    assert_eq!(comp.state().unwrap(), ResourceState::Inactive);
}

#[test]
fn test_unreachable_context_reports_created() {
    let (component, _owned, _participating) = component_with_contexts();
    component.set_dead_in(1);

    let (_tree, comp) = component_fixture(&component);
    assert_eq!(comp.state_in_ec(0).unwrap(), ResourceState::Created);
    // The others are alive and report their lifecycle value.
    assert_eq!(comp.state_in_ec(1).unwrap(), ResourceState::Inactive);
    assert!(comp.alive().unwrap());
}

#[test]
fn test_unrecognized_lifecycle_value_maps_to_unknown() {
    let component = Arc::new(MockComponent::new("comp"));
    let ec = Arc::new(MockEc::new(1));
    ec.set_state(RemoteLifecycle::Unrecognized(42));
    component.add_owned(ec);

    let (_tree, comp) = component_fixture(&component);
    assert_eq!(comp.state_in_ec(0).unwrap(), ResourceState::Unknown);
}

#[test]
fn test_refresh_updates_the_cached_context_state() {
    let (component, owned, _participating) = component_with_contexts();
    let (_tree, comp) = component_fixture(&component);

    assert_eq!(comp.state_in_ec(0).unwrap(), ResourceState::Inactive);

    // The remote state moves; the cache does not follow on its own.
    owned[0].set_state(RemoteLifecycle::Active);
    assert_eq!(comp.state_in_ec(0).unwrap(), ResourceState::Inactive);

    assert_eq!(comp.refresh_state_in_ec(0).unwrap(), ResourceState::Active);
    assert_eq!(comp.state_in_ec(0).unwrap(), ResourceState::Active);
}

#[test]
fn test_get_ec_index_scans_owned_before_participating() {
    let (component, _owned, _participating) = component_with_contexts();
    let (_tree, comp) = component_fixture(&component);

    assert_eq!(comp.get_ec_index(2).unwrap(), Some(1));
    assert_eq!(comp.get_ec_index(12).unwrap(), Some(4));
    assert_eq!(comp.get_ec_index(99).unwrap(), None);
}

#[test]
fn test_exec_context_snapshots_are_immutable() {
    let component = Arc::new(MockComponent::new("comp"));
    let ec = Arc::new(
        MockEc::new(7)
            .with_rate(50.0)
            .with_running(false)
            .with_owner("comp")
            .with_participants(["other0", "other1"]),
    );
    component.add_owned(ec);

    let (_tree, comp) = component_fixture(&component);
    let snapshot = &comp.owned_ecs().unwrap()[0];
    assert_eq!(snapshot.handle_id(), 7);
    assert_eq!(snapshot.rate(), 50.0);
    assert!(!snapshot.running());
    assert_eq!(snapshot.owner(), Some("comp"));
    assert_eq!(snapshot.participants(), ["other0", "other1"]);
}

#[test]
fn test_cache_groups_are_independent_and_idempotent() {
    let (component, _owned, _participating) = component_with_contexts();
    component.push_port(port("in", PortKind::Input, &[]));

    let (_tree, comp) = component_fixture(&component);
    // Classification fetched the profile exactly once.
    assert_eq!(component.profile_fetches(), 1);
    assert_eq!(component.port_fetches(), 0);

    // Repeated access hits the cache.
    let first = comp.ports().unwrap();
    let again = comp.ports().unwrap();
    assert_eq!(first, again);
    assert_eq!(component.port_fetches(), 1);

    // A group-scoped reparse re-fetches just that group, and with no remote
    // change the cached values come back identical.
    comp.reparse_ports();
    let after = comp.ports().unwrap();
    assert_eq!(after, first);
    assert_eq!(component.port_fetches(), 2);
    assert_eq!(component.profile_fetches(), 1);
    assert_eq!(component.owned_fetches(), 0);

    comp.reparse_ports();
    let and_again = comp.ports().unwrap();
    assert_eq!(and_again, after);

    // A full reparse clears every group; each refills on next access.
    comp.owned_ecs().unwrap();
    assert_eq!(component.owned_fetches(), 1);
    comp.reparse();
    comp.profile().unwrap();
    comp.owned_ecs().unwrap();
    assert_eq!(component.profile_fetches(), 2);
    assert_eq!(component.owned_fetches(), 2);
}

#[test]
fn test_port_views_are_filters_over_one_list() {
    let component = Arc::new(MockComponent::new("comp"));
    component.push_port(port("in0", PortKind::Input, &["c0"]));
    component.push_port(port("in1", PortKind::Input, &[]));
    component.push_port(port("out0", PortKind::Output, &["c1"]));
    component.push_port(port("svc0", PortKind::Service, &[]));

    let (_tree, comp) = component_fixture(&component);

    let names = |ports: Vec<Port>| ports.into_iter().map(|p| p.name).collect::<Vec<_>>();

    assert_eq!(names(comp.inports().unwrap()), ["in0", "in1"]);
    assert_eq!(names(comp.outports().unwrap()), ["out0"]);
    assert_eq!(names(comp.svcports().unwrap()), ["svc0"]);
    assert_eq!(names(comp.connected_ports().unwrap()), ["in0", "out0"]);
    assert_eq!(names(comp.connected_inports().unwrap()), ["in0"]);
    assert_eq!(names(comp.connected_outports().unwrap()), ["out0"]);
    assert!(comp.connected_svcports().unwrap().is_empty());

    assert!(comp.has_port_by_name("svc0").unwrap());
    assert!(comp.get_port_by_name("nope").unwrap().is_none());
    // The four views cost a single remote fetch.
    assert_eq!(component.port_fetches(), 1);
}

#[test]
fn test_conf_set_mutation_writes_through() {
    let component = Arc::new(MockComponent::new("comp"));
    let configuration = component.configuration_mock();
    configuration.add_set(ConfigSetData {
        id: "default".to_string(),
        description: "defaults".to_string(),
        data: BTreeMap::from([("gain".to_string(), "1.0".to_string())]),
    });
    configuration.add_set(ConfigSetData {
        id: "fast".to_string(),
        description: "tuned".to_string(),
        data: BTreeMap::from([("gain".to_string(), "4.0".to_string())]),
    });
    configuration.set_active("default");

    let (_tree, comp) = component_fixture(&component);

    let sets = comp.conf_sets().unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(comp.active_conf_set_name().unwrap().as_deref(), Some("default"));
    assert_eq!(
        comp.active_conf_set().unwrap().unwrap().data()["gain"],
        "1.0"
    );

    // The write lands locally and remotely in one call.
    comp.set_conf_set_value("default", "gain", "2.0").unwrap();
    assert_eq!(comp.conf_sets().unwrap()["default"].data()["gain"], "2.0");
    assert_eq!(configuration.stored_set("default").unwrap().data["gain"], "2.0");
    assert_eq!(configuration.written().len(), 1);

    // Activation is checked locally, then forwarded.
    comp.activate_conf_set("fast").unwrap();
    assert_eq!(configuration.active().as_deref(), Some("fast"));
    assert_eq!(configuration.activated(), ["fast"]);
}

#[test]
fn test_conf_set_guards_mutate_nothing_on_failure() {
    let component = Arc::new(MockComponent::new("comp"));
    let configuration = component.configuration_mock();
    configuration.add_set(ConfigSetData {
        id: "default".to_string(),
        description: String::new(),
        data: BTreeMap::from([("gain".to_string(), "1.0".to_string())]),
    });

    let (_tree, comp) = component_fixture(&component);

    assert!(matches!(
        comp.set_conf_set_value("missing", "gain", "2.0"),
        Err(Error::NoSuchConfSet(name)) if name == "missing"
    ));
    assert!(matches!(
        comp.set_conf_set_value("default", "missing", "2.0"),
        Err(Error::NoSuchConfParam(name)) if name == "missing"
    ));
    assert!(matches!(
        comp.activate_conf_set("missing"),
        Err(Error::NoSuchConfSet(_))
    ));

    // Neither the local cache nor the remote object moved.
    assert_eq!(comp.conf_sets().unwrap()["default"].data()["gain"], "1.0");
    assert!(configuration.written().is_empty());
    assert!(configuration.activated().is_empty());
    assert_eq!(configuration.active(), None);
}

#[test]
fn test_conf_sets_reparse_refetches_once() {
    let component = Arc::new(MockComponent::new("comp"));
    let configuration = component.configuration_mock();
    configuration.add_set(ConfigSetData {
        id: "default".to_string(),
        description: String::new(),
        data: BTreeMap::new(),
    });

    let (_tree, comp) = component_fixture(&component);

    comp.conf_sets().unwrap();
    comp.conf_sets().unwrap();
    assert_eq!(configuration.set_fetches(), 1);

    comp.reparse_conf_sets();
    comp.conf_sets().unwrap();
    assert_eq!(configuration.set_fetches(), 2);
}

#[test]
fn test_exit_reaches_the_remote_object() {
    let component = Arc::new(MockComponent::new("comp"));
    let (tree, comp) = component_fixture(&component);

    comp.exit().unwrap();
    assert_eq!(component.exits(), 1);
    // The node is only removed by a reparse.
    assert!(tree.has_path(&["/", ADDR, "comp.cmp"]));
}

#[test]
fn test_manager_cache_groups_follow_the_same_discipline() {
    let manager = Arc::new(MockManager::new("manager"));
    manager.set_config("log_level", "info");

    let (_tree, mgr) = manager_fixture(&manager);
    // Classification fetched the profile exactly once.
    assert_eq!(manager.profile_fetches(), 1);

    let profile = mgr.profile().unwrap();
    assert_eq!(profile["instance_name"], "manager");
    assert_eq!(manager.profile_fetches(), 1);

    assert_eq!(mgr.configuration().unwrap()["log_level"], "info");
    mgr.configuration().unwrap();
    assert_eq!(manager.configuration_fetches(), 1);

    // A write invalidates the configuration group.
    mgr.set_config_param("log_level", "debug").unwrap();
    assert_eq!(mgr.configuration().unwrap()["log_level"], "debug");
    assert_eq!(manager.configuration_fetches(), 2);

    mgr.reparse_profile();
    mgr.profile().unwrap();
    assert_eq!(manager.profile_fetches(), 2);

    mgr.shutdown().unwrap();
    assert_eq!(manager.shutdowns(), 1);
}

#[test]
fn test_component_profile_snapshot() {
    let component = Arc::new(MockComponent::new("comp"));
    let (_tree, comp) = component_fixture(&component);

    let profile = comp.profile().unwrap();
    assert_eq!(profile.instance_name, "comp");
    assert_eq!(profile.vendor, "nstree");
    assert_eq!(profile.parent, None);
}
