use std::fmt;

use crate::coordinator::{BuildError, ContainerBuildCoordinator};
use crate::executor::ProcessRunner;
use crate::prompt::Prompt;

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub builder: CheckResult,
    pub daemon: CheckResult,
    pub publish_command: CheckResult,
    pub registry: CheckResult,
    pub config_file: CheckResult,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.builder.passed
            && self.daemon.passed
            && self.publish_command.passed
            && self.registry.passed
            && self.config_file.passed
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("Builder", &self.builder),
            ("Daemon", &self.daemon),
            ("Publish tool", &self.publish_command),
            ("Registry", &self.registry),
            ("kubify.toml", &self.config_file),
        ];
        writeln!(f, "kubify doctor")?;
        writeln!(f, "------------------------------")?;
        for (label, check) in rows {
            writeln!(f, "{label:<14}{} {}", check.icon(), check.detail)?;
        }
        writeln!(f, "------------------------------")?;
        if self.all_passed() {
            write!(f, "All checks passed!")
        } else {
            write!(f, "Some checks failed")
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}

impl<R: ProcessRunner, P: Prompt> ContainerBuildCoordinator<R, P> {
    /// Run all diagnostic checks without early return.
    ///
    /// `registry` is the configured push target, if any. The config file
    /// check is left to the caller.
    pub async fn doctor(&self, registry: Option<&str>) -> DoctorReport {
        let mut report = DoctorReport::default();
        let options = self.options();

        // 1. Builder binary
        let builder = self.runner().is_available(&options.builder);
        report.builder = match &builder.path {
            Some(path) if builder.available => CheckResult::ok(&path.display().to_string()),
            _ => CheckResult::fail(&format!("{} not found on PATH", options.builder)),
        };

        // 2. Daemon
        report.daemon = if builder.available {
            match self.check_health(false).await {
                Ok(info) => CheckResult::ok(&match info.server_version.as_deref() {
                    Some(version) => format!("running (server {version})"),
                    None => "running".to_owned(),
                }),
                Err(BuildError::DaemonError { errors }) => CheckResult::fail(&errors.join("; ")),
                Err(e) => CheckResult::fail(&e.to_string()),
            }
        } else {
            CheckResult::fail("skipped, builder missing")
        };

        // 3. Publish tool, only needed for project resources
        let publish = self.runner().is_available(&options.publish_command);
        report.publish_command = match &publish.path {
            Some(path) if publish.available => CheckResult::ok(&path.display().to_string()),
            _ => CheckResult::ok(&format!(
                "{} not found (only needed for project resources)",
                options.publish_command
            )),
        };

        // 4. Registry
        report.registry = match registry {
            Some(url) => CheckResult::ok(url),
            None => CheckResult::ok("not configured, images are not pushed"),
        };

        report
    }
}
