use kubify_core::{
    ClusterDnsHost, ExpressionResolver, HostStrategy, LoopbackHost, Manifest, ResolveError,
    SecretOrigin, SecretStore,
};
use std::collections::HashMap;

const APP: &str = r#"{
  "resources": {
    "db": {
      "type": "container.v0",
      "image": "postgres:16",
      "env": { "POSTGRES_PASSWORD": "{db-password.value}" },
      "bindings": {
        "tcp": { "scheme": "tcp", "protocol": "tcp", "transport": "tcp", "targetPort": 5432 }
      },
      "connectionString": "Host={db.bindings.tcp.host};Port={db.bindings.tcp.port}"
    },
    "app": {
      "type": "project.v0",
      "path": "App/App.csproj",
      "env": {
        "ConnectionStrings__db": "{db.connectionString}",
        "DB_URL": "{db.bindings.tcp.url}",
        "DB_PASSWORD": "{db-password.value}"
      },
      "bindings": { "http": { "scheme": "http", "protocol": "tcp", "transport": "http" } }
    },
    "db-password": {
      "type": "parameter.v0",
      "value": "{db-password.inputs.value}",
      "inputs": {
        "value": {
          "type": "string",
          "secret": true,
          "default": { "generate": { "minLength": 22 } }
        }
      }
    },
    "region": {
      "type": "parameter.v0",
      "value": "{region.inputs.value}",
      "inputs": { "value": { "type": "string", "default": { "value": "eu-west-1" } } }
    },
    "api-key": {
      "type": "parameter.v0",
      "value": "{api-key.inputs.value}",
      "inputs": { "value": { "type": "string", "secret": true } }
    }
  }
}"#;

fn app_manifest() -> Manifest {
    Manifest::parse(APP).unwrap()
}

#[test]
fn connection_string_example_resolves() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let app = manifest.get("app").unwrap();
    let resolved = resolver
        .resolve_text(&app.env()["ConnectionStrings__db"])
        .unwrap();

    assert_eq!(resolved.value, "Host=db;Port=5432");
    assert!(!resolved.secret);
}

#[test]
fn binding_paths_resolve_to_literals() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    assert_eq!(resolver.resolve_path("db", "bindings.tcp.port").unwrap().value, "5432");
    assert_eq!(resolver.resolve_path("db", "bindings.tcp.scheme").unwrap().value, "tcp");
    assert_eq!(
        resolver.resolve_path("db", "bindings.tcp.url").unwrap().value,
        "tcp://db:5432"
    );
    assert_eq!(
        resolver.resolve_path("app", "bindings.http.port").unwrap().value,
        "8080"
    );
}

#[test]
fn host_strategy_is_injectable() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();

    let loopback = ExpressionResolver::new(&manifest, &secrets).with_host_strategy(Box::new(LoopbackHost));
    assert_eq!(
        loopback.resolve_path("db", "connectionString").unwrap().value,
        "Host=localhost;Port=5432"
    );

    let cluster = ExpressionResolver::new(&manifest, &secrets).with_host_strategy(Box::new(
        ClusterDnsHost {
            namespace: "shop".to_owned(),
        },
    ));
    assert_eq!(
        cluster.resolve_path("db", "bindings.tcp.host").unwrap().value,
        "db.shop.svc.cluster.local"
    );

    struct Fixed;
    impl HostStrategy for Fixed {
        fn host(&self, resource: &str, binding: &str) -> String {
            format!("{resource}-{binding}.internal")
        }
    }
    let custom = ExpressionResolver::new(&manifest, &secrets).with_host_strategy(Box::new(Fixed));
    assert_eq!(
        custom.resolve_path("db", "bindings.tcp.host").unwrap().value,
        "db-tcp.internal"
    );
}

#[test]
fn generated_secret_is_stable_within_a_run() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let first = resolver.resolve_path("db-password", "value").unwrap();
    assert!(first.value.len() >= 22);
    assert!(first.secret);

    let app = manifest.get("app").unwrap();
    let via_env = resolver.resolve_text(&app.env()["DB_PASSWORD"]).unwrap();
    let via_input = resolver
        .resolve_path("db-password", "inputs.value.value")
        .unwrap();

    assert_eq!(via_env.value, first.value);
    assert_eq!(via_input.value, first.value);
    assert_eq!(secrets.generated_count(), 1);
    assert_eq!(secrets.origin("db-password"), Some(SecretOrigin::Generated));
}

#[test]
fn secret_taint_propagates_through_expressions() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let db = manifest.get("db").unwrap();
    let password = resolver.resolve_text(&db.env()["POSTGRES_PASSWORD"]).unwrap();
    assert!(password.secret);

    let mixed = resolver
        .resolve_text("user=admin;password={db-password.value}")
        .unwrap();
    assert!(mixed.secret);
    assert!(mixed.value.starts_with("user=admin;password="));
}

#[test]
fn concurrent_resolution_generates_once() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let values: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| resolver.resolve_path("db-password", "value").unwrap().value))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(values.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(secrets.generated_count(), 1);
}

#[test]
fn supplied_parameter_wins_over_generation() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets).with_parameters(HashMap::from([
        ("db-password".to_owned(), "hunter2".to_owned()),
        ("api-key.value".to_owned(), "k-123".to_owned()),
    ]));

    let password = resolver.resolve_path("db-password", "value").unwrap();
    assert_eq!(password.value, "hunter2");
    assert!(password.secret);
    assert_eq!(resolver.resolve_path("api-key", "value").unwrap().value, "k-123");
    assert_eq!(secrets.generated_count(), 0);
}

#[test]
fn default_value_is_used_when_nothing_supplied() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let region = resolver.resolve_path("region", "value").unwrap();
    assert_eq!(region.value, "eu-west-1");
    assert!(!region.secret);
}

#[test]
fn input_without_value_or_policy_fails() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let err = resolver.resolve_path("api-key", "value").unwrap_err();
    assert!(matches!(
        err,
        ResolveError::MissingParameterValue { ref parameter, ref input }
            if parameter == "api-key" && input == "value"
    ));
}

#[test]
fn persisted_secret_is_reused() {
    let tmp = tempfile::TempDir::new().unwrap();
    let state = tmp.path().join("secrets.json");
    let manifest = app_manifest();

    let first = {
        let secrets = SecretStore::new();
        let resolver = ExpressionResolver::new(&manifest, &secrets);
        let value = resolver.resolve_path("db-password", "value").unwrap().value;
        secrets.save(&state).unwrap();
        value
    };

    let secrets = SecretStore::load(&state).unwrap();
    let resolver = ExpressionResolver::new(&manifest, &secrets);
    let second = resolver.resolve_path("db-password", "value").unwrap().value;

    assert_eq!(first, second);
    assert_eq!(secrets.generated_count(), 0);
    assert_eq!(secrets.origin("db-password"), Some(SecretOrigin::Persisted));
}

#[test]
fn unknown_resource_and_path_are_errors() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    assert!(matches!(
        resolver.resolve_text("{nope.value}").unwrap_err(),
        ResolveError::UnknownResourceReference { ref resource, .. } if resource == "nope"
    ));
    assert!(matches!(
        resolver.resolve_text("{db.bindings.udp.port}").unwrap_err(),
        ResolveError::UnknownPath { ref path, .. } if path == "bindings.udp.port"
    ));
    assert!(matches!(
        resolver.resolve_text("{db.bindings.tcp.color}").unwrap_err(),
        ResolveError::UnknownPath { .. }
    ));
    assert!(matches!(
        resolver.resolve_text("{app.value}").unwrap_err(),
        ResolveError::UnknownPath { .. }
    ));
}

#[test]
fn malformed_expression_is_an_error() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    assert!(matches!(
        resolver.resolve_text("Host={db.bindings.tcp.host").unwrap_err(),
        ResolveError::MalformedExpression(_)
    ));
    assert!(matches!(
        resolver.resolve_text("{}").unwrap_err(),
        ResolveError::MalformedExpression(_)
    ));
}

#[test]
fn mutual_value_references_are_cyclic() {
    let manifest = Manifest::parse(
        r#"{"resources": {
            "a": {"type": "value.v0", "value": "{b.value}"},
            "b": {"type": "value.v0", "value": "{a.value}"}
        }}"#,
    )
    .unwrap();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let err = resolver.resolve_path("a", "value").unwrap_err();
    match err {
        ResolveError::CyclicReference { chain } => {
            assert_eq!(chain, vec!["a.value", "b.value", "a.value"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn self_cycle_through_value_is_detected() {
    let manifest = Manifest::parse(
        r#"{"resources": {
            "loop": {"type": "value.v0", "value": "x{loop.connectionString}", "connectionString": "{loop.value}"}
        }}"#,
    )
    .unwrap();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    assert!(matches!(
        resolver.resolve_path("loop", "value").unwrap_err(),
        ResolveError::CyclicReference { .. }
    ));
}

#[test]
fn repeated_resolution_is_idempotent() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let text = "{db.connectionString}|{db-password.value}";
    let first = resolver.resolve_text(text).unwrap();
    let second = resolver.resolve_text(text).unwrap();
    assert_eq!(first, second);
}

#[test]
fn parameter_value_reads_its_input_in_both_path_forms() {
    let manifest = app_manifest();
    let secrets = SecretStore::new();
    let resolver = ExpressionResolver::new(&manifest, &secrets);

    let short = resolver.resolve_text("{db-password.inputs.value}").unwrap();
    let long = resolver.resolve_text("{db-password.inputs.value.value}").unwrap();
    let via_value = resolver.resolve_text("{db-password.value}").unwrap();

    assert_eq!(short.value.len(), 22);
    assert!(short.secret);
    assert_eq!(short.value, long.value);
    assert_eq!(short.value, via_value.value);
    assert_eq!(secrets.generated_count(), 1);

    assert_eq!(resolver.resolve_text("{region.value}").unwrap().value, "eu-west-1");
}
