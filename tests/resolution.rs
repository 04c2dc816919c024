mod common;

use common::*;
use ingress_resolver::model::ObjectKey;
use ingress_resolver::resolver::{FragmentState, Reason};
use ingress_resolver::store::{loader::parse_toml, StoreSnapshot};

#[test]
fn test_precedence_across_delegations() {
    let resolution = resolve(&precedence_snapshot());
    let table = resolution.table("r.example.com").unwrap();
    let served_by = |path: &str| table.select(path).map(|r| r.source.name.clone());

    assert_eq!(served_by("/app/admin").as_deref(), Some("b"));
    assert_eq!(served_by("/app/adminfoo").as_deref(), Some("a"));
    assert_eq!(served_by("/admin/app").as_deref(), Some("b"));
    // Segment-aware: `/admin-app` is not under `Prefix(/admin)`.
    assert_eq!(served_by("/admin-app").as_deref(), Some("a"));
    assert_eq!(served_by("/app").as_deref(), Some("a"));

    let ids: Vec<_> = table.routes.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "r.example.com|exact:/app/admin",
            "r.example.com|prefix:/admin",
            "r.example.com|prefix:/app",
            "r.example.com|prefix:/",
        ]
    );
    assert!(resolution.statuses.iter().all(|s| s.is_valid()));
}

#[test]
fn test_resolution_is_deterministic() {
    let forward = precedence_snapshot();

    // Same objects, inserted in the opposite order.
    let mut fragments: Vec<_> = forward.fragments().map(|(_, f)| f.clone()).collect();
    fragments.reverse();
    let mut reversed = StoreSnapshot::new()
        .with_service("team-b", "b", &[80])
        .with_service("team-a", "a", &[80]);
    for fragment in fragments {
        reversed.insert_fragment(fragment);
    }

    let first = serde_json::to_string(&resolve(&forward)).unwrap();
    let second = serde_json::to_string(&resolve(&reversed)).unwrap();
    let again = serde_json::to_string(&resolve(&forward)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, again);
}

#[test]
fn test_root_namespace_restriction() {
    let snapshot = StoreSnapshot::new()
        .with_service("roots", "web", &[80])
        .with_service("tenant", "web", &[80])
        .with_fragment(root("roots", "allowed", "ok.example.com", vec![route(vec![], "web")], vec![]))
        .with_fragment(root("tenant", "rogue", "rogue.example.com", vec![route(vec![], "web")], vec![]));

    let resolution = resolve_with_roots(&snapshot, &["roots"]);
    assert!(resolution.table("ok.example.com").is_some());
    assert!(resolution.table("rogue.example.com").is_none());

    let rogue = resolution.status(&ObjectKey::new("tenant", "rogue")).unwrap();
    assert_eq!(rogue.state, FragmentState::Invalid);
    assert_eq!(rogue.conditions[0].reason, "RootNamespaceError");

    // An empty allow-list admits every namespace.
    assert_eq!(resolve(&snapshot).tables.len(), 2);
}

#[test]
fn test_orphan_isolation() {
    let build = |with_include: bool| {
        let includes = if with_include {
            vec![include("c", prefix("/c"))]
        } else {
            vec![]
        };
        StoreSnapshot::new()
            .with_service("ns", "web", &[80])
            .with_fragment(root("ns", "one", "one.example.com", vec![route(vec![], "web")], includes))
            .with_fragment(root("ns", "two", "two.example.com", vec![route(vec![], "web")], vec![]))
            .with_fragment(child("ns", "c", vec![route(vec![], "web")], vec![]))
    };

    let before = resolve(&build(true));
    let after = resolve(&build(false));

    let c = ObjectKey::new("ns", "c");
    assert!(before.status(&c).unwrap().is_valid());
    assert_eq!(after.status(&c).unwrap().state, FragmentState::Orphaned);
    assert!(after.status(&c).unwrap().has_reason(Reason::OrphanedError));

    assert!(after.status(&ObjectKey::new("ns", "one")).unwrap().is_valid());
    assert_eq!(before.table("two.example.com"), after.table("two.example.com"));
    assert_eq!(after.table("one.example.com").unwrap().routes.len(), 1);
}

#[test]
fn test_cycle_leaves_other_trees_serving() {
    let snapshot = StoreSnapshot::new()
        .with_service("ns", "web", &[80])
        .with_fragment(root("ns", "looped", "looped.example.com", vec![route(vec![], "web")], vec![include("x", prefix("/x"))]))
        .with_fragment(child("ns", "x", vec![route(vec![], "web")], vec![include("y", prefix("/y"))]))
        .with_fragment(child("ns", "y", vec![route(vec![], "web")], vec![include("x", prefix("/x"))]))
        .with_fragment(root("ns", "fine", "fine.example.com", vec![route(vec![], "web")], vec![]));

    let resolution = resolve(&snapshot);
    for name in ["x", "y"] {
        let status = resolution.status(&ObjectKey::new("ns", name)).unwrap();
        assert!(status.has_reason(Reason::IncludeCycleError), "{} not flagged", name);
    }
    assert!(resolution.status(&ObjectKey::new("ns", "looped")).unwrap().is_valid());
    assert_eq!(resolution.table("looped.example.com").unwrap().routes.len(), 1);
    assert_eq!(resolution.table("fine.example.com").unwrap().routes.len(), 1);
}

#[test]
fn test_policy_error_drops_only_that_fragment() {
    let mut bad = child("ns", "bad", vec![route(vec![], "web")], vec![]);
    bad.routes[0].rate_limit = rate_limit(10, "fortnight");

    let snapshot = StoreSnapshot::new()
        .with_service("ns", "web", &[80])
        .with_fragment(root(
            "ns",
            "r",
            "r.example.com",
            vec![route(vec![], "web")],
            vec![include("bad", prefix("/bad")), include("good", prefix("/good"))],
        ))
        .with_fragment(bad)
        .with_fragment(child("ns", "good", vec![route(vec![], "web")], vec![]));

    let resolution = resolve(&snapshot);
    let bad = resolution.status(&ObjectKey::new("ns", "bad")).unwrap();
    assert_eq!(bad.reasons(), vec!["PolicyError"]);

    let table = resolution.table("r.example.com").unwrap();
    assert_eq!(table.select("/bad/x").unwrap().source.name, "r");
    assert_eq!(table.select("/good/x").unwrap().source.name, "good");
}

#[test]
fn test_route_policy_overrides_virtual_host() {
    let mut r = root(
        "ns",
        "r",
        "r.example.com",
        vec![route(vec![], "web")],
        vec![include("api", prefix("/api"))],
    );
    if let Some(vhost) = r.virtual_host.as_mut() {
        vhost.rate_limit = rate_limit(100, "second");
        vhost.request_headers = headers(&[("x-site", "r")], &[]);
    }
    let mut api = child("ns", "api", vec![route(vec![], "web")], vec![]);
    api.routes[0].rate_limit = rate_limit(5, "minute");

    let snapshot = StoreSnapshot::new()
        .with_service("ns", "web", &[80])
        .with_fragment(r)
        .with_fragment(api);

    let resolution = resolve(&snapshot);
    let table = resolution.table("r.example.com").unwrap();

    let api_route = table.select("/api/v1").unwrap();
    assert_eq!(api_route.policy.rate_limit.unwrap().requests, 5);
    assert_eq!(api_route.policy.request_headers.as_ref().unwrap().set[0].name, "x-site");

    let root_route = table.select("/").unwrap();
    assert_eq!(root_route.policy.rate_limit.unwrap().requests, 100);
}

#[test]
fn test_toml_snapshot_resolves() {
    let doc = parse_toml(
        r#"
        [[services]]
        namespace = "shop"
        name = "web"
        ports = [8080]

        [[fragments]]
        namespace = "shop"
        name = "site"
        virtual_host = { fqdn = "Shop.Example.com" }
        includes = [{ name = "cart", conditions = [{ prefix = "/cart" }] }]

        [[fragments.routes]]
        services = [{ name = "web", port = 8080 }]

        [[fragments]]
        namespace = "shop"
        name = "cart"

        [[fragments.routes]]
        conditions = [{ exact = "/checkout" }]
        services = [{ name = "web", port = 8080, weight = 2 }]
        "#,
    )
    .unwrap();

    let resolution = resolve(&StoreSnapshot::from_document(doc));
    let table = resolution.table("shop.example.com").unwrap();
    let checkout = table.select("/cart/checkout").unwrap();
    assert_eq!(checkout.id, "shop.example.com|exact:/cart/checkout");
    assert_eq!(checkout.services[0].weight, 2);
    assert_eq!(table.select("/cart/items").unwrap().source.name, "site");
}
