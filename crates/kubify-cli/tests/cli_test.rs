use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn kubify() -> assert_cmd::Command {
    cargo_bin_cmd!("kubify")
}

const SHOP: &str = r#"{
  "resources": {
    "cache": {
      "type": "container.v0",
      "image": "redis:7",
      "bindings": {
        "tcp": { "scheme": "tcp", "protocol": "tcp", "transport": "tcp", "targetPort": 6379 }
      },
      "connectionString": "{cache.bindings.tcp.host}:{cache.bindings.tcp.port}"
    },
    "db": {
      "type": "container.v0",
      "image": "postgres:16",
      "env": { "POSTGRES_PASSWORD": "{db-password.value}" },
      "bindings": {
        "tcp": { "scheme": "tcp", "protocol": "tcp", "transport": "tcp", "targetPort": 5432 }
      },
      "volumes": [ { "name": "db-data", "target": "/var/lib/postgresql/data" } ]
    },
    "api": {
      "type": "project.v0",
      "path": "Api/Api.csproj",
      "env": {
        "ConnectionStrings__cache": "{cache.connectionString}",
        "DB_PASSWORD": "{db-password.value}"
      },
      "bindings": {
        "http": { "scheme": "http", "protocol": "tcp", "transport": "http", "targetPort": 8080, "external": true }
      }
    },
    "db-password": {
      "type": "parameter.v0",
      "value": "{db-password.inputs.value}",
      "inputs": {
        "value": { "type": "string", "secret": true, "default": { "generate": { "minLength": 22 } } }
      }
    }
  }
}"#;

fn project(manifest: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("aspire-manifest.json"), manifest).unwrap();
    tmp
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

// ── Help / Version ──

#[test]
fn shows_help() {
    kubify()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generate Kubernetes manifests"));
}

#[test]
fn shows_version() {
    kubify()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kubify"));
}

#[test]
fn generate_help_lists_resolution_options() {
    kubify()
        .args(["generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--host-strategy"))
        .stdout(predicate::str::contains("--parameter"))
        .stdout(predicate::str::contains("--non-interactive"));
}

// ── Generate ──

#[test]
fn generate_writes_artifacts_per_workload() {
    let tmp = project(SHOP);

    kubify()
        .current_dir(tmp.path())
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated artifacts for 3 workload(s)"));

    let out = tmp.path().join("kubify-output");
    assert!(out.join("cache/deployment.yaml").exists());
    assert!(out.join("cache/service.yaml").exists());
    assert!(out.join("db/statefulset.yaml").exists());
    assert!(out.join("db/secret.yaml").exists());
    assert!(out.join("api/deployment.yaml").exists());
    assert!(out.join("api/configmap.yaml").exists());
    assert!(out.join("api/service-http-external.yaml").exists());
    assert!(!out.join("db-password").exists());

    let config = read(&out.join("api/configmap.yaml"));
    assert!(config.contains("cache:6379"));
    assert!(!config.contains('{'));
}

#[test]
fn generate_persists_and_reuses_generated_secrets() {
    let tmp = project(SHOP);

    kubify().current_dir(tmp.path()).arg("generate").assert().success();
    let state = tmp.path().join(".kubify/secrets.json");
    assert!(state.exists());
    let first = read(&tmp.path().join("kubify-output/db/secret.yaml"));

    kubify().current_dir(tmp.path()).arg("generate").assert().success();
    let second = read(&tmp.path().join("kubify-output/db/secret.yaml"));

    assert_eq!(first, second);
}

#[test]
fn generate_honors_output_dir_and_namespace() {
    let tmp = project(SHOP);

    kubify()
        .current_dir(tmp.path())
        .args(["generate", "-o", "deploy", "--namespace", "shop"])
        .assert()
        .success();

    let deployment = read(&tmp.path().join("deploy/cache/deployment.yaml"));
    assert!(deployment.contains("namespace: shop"));
    assert!(!tmp.path().join("kubify-output").exists());
}

#[test]
fn generate_reads_settings_from_kubify_toml() {
    let tmp = project(SHOP);
    std::fs::write(
        tmp.path().join("kubify.toml"),
        r#"
[output]
dir = "k8s"

[registry]
url = "ghcr.io/acme"
tag = "v2"

[secrets]
persist = false
"#,
    )
    .unwrap();

    kubify()
        .current_dir(tmp.path())
        .arg("generate")
        .assert()
        .success();

    let api = read(&tmp.path().join("k8s/api/deployment.yaml"));
    assert!(api.contains("ghcr.io/acme/api:v2"));
    assert!(!tmp.path().join(".kubify/secrets.json").exists());
}

#[test]
fn generate_uses_parameter_flag() {
    let tmp = project(
        r#"{
  "resources": {
    "greeting": {
      "type": "parameter.v0",
      "value": "{greeting.inputs.value}",
      "inputs": { "value": { "type": "string" } }
    },
    "web": {
      "type": "container.v0",
      "image": "nginx",
      "env": { "GREETING": "{greeting.value}" }
    }
  }
}"#,
    );

    kubify()
        .current_dir(tmp.path())
        .arg("generate")
        .assert()
        .failure()
        .code(2);

    kubify()
        .current_dir(tmp.path())
        .args(["generate", "--parameter", "greeting=hello"])
        .assert()
        .success();

    let config = read(&tmp.path().join("kubify-output/web/configmap.yaml"));
    assert!(config.contains("hello"));
}

#[test]
fn generate_loopback_strategy_changes_hosts() {
    let tmp = project(SHOP);

    kubify()
        .current_dir(tmp.path())
        .args(["generate", "--host-strategy", "loopback"])
        .assert()
        .success();

    let config = read(&tmp.path().join("kubify-output/api/configmap.yaml"));
    assert!(config.contains("localhost:6379"));
}

// ── Errors ──

#[test]
fn missing_manifest_exits_with_manifest_error() {
    let tmp = TempDir::new().unwrap();

    kubify()
        .current_dir(tmp.path())
        .arg("generate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("aspire-manifest.json"));
}

#[test]
fn dependency_cycle_exits_with_manifest_error() {
    let tmp = project(
        r#"{
  "resources": {
    "a": { "type": "value.v0", "value": "{b.value}" },
    "b": { "type": "value.v0", "value": "{a.value}" }
  }
}"#,
    );

    kubify()
        .current_dir(tmp.path())
        .arg("generate")
        .assert()
        .failure()
        .code(2);

    assert!(!tmp.path().join("kubify-output").exists());
}

#[test]
fn unknown_reference_exits_with_manifest_error() {
    let tmp = project(
        r#"{
  "resources": {
    "web": {
      "type": "container.v0",
      "image": "nginx",
      "env": { "DB": "{missing.connectionString}" }
    }
  }
}"#,
    );

    kubify()
        .current_dir(tmp.path())
        .arg("generate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("missing"));
}

#[test]
fn invalid_parameter_flag_is_rejected() {
    let tmp = project(SHOP);

    kubify()
        .current_dir(tmp.path())
        .args(["generate", "--parameter", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=VALUE"));
}

// ── Plan ──

#[test]
fn plan_prints_order_without_writing() {
    let tmp = project(SHOP);

    kubify()
        .current_dir(tmp.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolution order:"))
        .stdout(predicate::str::contains("api (project.v0) <- "))
        .stdout(predicate::str::contains("statefulset.yaml"));

    assert!(!tmp.path().join("kubify-output").exists());
}

// ── Build ordering ──

const DOCKERFILE_APP: &str = r#"{
  "resources": {
    "pw": {
      "type": "parameter.v0",
      "value": "{pw.inputs.value}",
      "inputs": { "value": { "type": "string", "secret": true } }
    },
    "web": {
      "type": "dockerfile.v0",
      "path": "web/Dockerfile",
      "context": "web",
      "env": { "PASSWORD": "{pw.value}" }
    }
  }
}"#;

/// Puts a `docker` on PATH that records each invocation in `docker.log`.
#[cfg(unix)]
fn fake_docker(tmp: &TempDir) -> (String, std::path::PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let bin = tmp.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let log = tmp.path().join("docker.log");
    let script = format!(
        "#!/bin/sh\n\
         echo \"$*\" >> '{}'\n\
         if [ \"$1\" = \"info\" ]; then echo '{{\"ServerErrors\":null,\"ServerVersion\":\"27.0.0\"}}'; fi\n\
         exit 0\n",
        log.display()
    );
    let docker = bin.join("docker");
    std::fs::write(&docker, script).unwrap();
    std::fs::set_permissions(&docker, std::fs::Permissions::from_mode(0o755)).unwrap();

    let path = match std::env::var_os("PATH") {
        Some(existing) => format!("{}:{}", bin.display(), existing.to_string_lossy()),
        None => bin.display().to_string(),
    };
    (path, log)
}

#[cfg(unix)]
#[test]
fn resolution_error_stops_before_any_build_or_push() {
    let tmp = project(DOCKERFILE_APP);
    let (path, log) = fake_docker(&tmp);

    kubify()
        .current_dir(tmp.path())
        .env("PATH", &path)
        .args(["generate", "--build", "--registry", "reg.local", "--non-interactive"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("pw"));

    assert!(!log.exists(), "builder ran: {}", read(&log));
    assert!(!tmp.path().join("kubify-output").exists());

    kubify()
        .current_dir(tmp.path())
        .env("PATH", &path)
        .args(["build", "--registry", "reg.local", "--non-interactive"])
        .assert()
        .failure()
        .code(2);

    assert!(!log.exists());
}

#[cfg(unix)]
#[test]
fn resolved_manifest_is_built_pushed_then_written() {
    let tmp = project(DOCKERFILE_APP);
    let (path, log) = fake_docker(&tmp);

    kubify()
        .current_dir(tmp.path())
        .env("PATH", &path)
        .args([
            "generate",
            "--build",
            "--registry",
            "reg.local",
            "--non-interactive",
            "--parameter",
            "pw=s3cret",
        ])
        .assert()
        .success();

    let calls = read(&log);
    let lines: Vec<&str> = calls.lines().collect();
    assert!(lines[0].starts_with("info"), "{calls}");
    assert!(
        lines.iter().any(|l| l.starts_with("build --tag reg.local/web:latest")),
        "{calls}"
    );
    assert!(lines.contains(&"push reg.local/web:latest"), "{calls}");

    let deployment = read(&tmp.path().join("kubify-output/web/deployment.yaml"));
    assert!(deployment.contains("reg.local/web:latest"));
    let secret = read(&tmp.path().join("kubify-output/web/secret.yaml"));
    assert!(secret.contains("s3cret"));
}
