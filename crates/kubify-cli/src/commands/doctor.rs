use std::path::Path;

use kubify_container::{BuildOptions, CancellationToken, CheckResult, ContainerBuildCoordinator};
use kubify_core::KubifyConfig;

pub async fn doctor() -> anyhow::Result<()> {
    let config_path = Path::new("kubify.toml");
    let (config, config_check) = match KubifyConfig::load(Path::new(".")) {
        Ok(config) if config_path.exists() => (config, CheckResult::ok("Found")),
        Ok(config) => (config, CheckResult::fail("Not found, using defaults")),
        Err(e) => (KubifyConfig::default(), CheckResult::fail(&e.to_string())),
    };

    let coordinator =
        ContainerBuildCoordinator::new(BuildOptions::from_config(&config), CancellationToken::new());
    let mut report = coordinator.doctor(config.registry.url.as_deref()).await;
    report.config_file = config_check;

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed, see above for details");
    }

    Ok(())
}
