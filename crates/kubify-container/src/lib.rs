//! Container image build and push for kubify.
//!
//! ```text
//! check health ── <builder> info --format "{{json .}}"   (once, before any build)
//! build        ── <builder> build --tag <image> --file <Dockerfile> <context>
//!                 <publish> publish <project> /t:PublishContainer ...
//! retry        ── duplicate publish output only, with
//!                 -p:ErrorOnDuplicatePublishOutputFiles=false
//! push         ── <builder> push <image>                 (when a registry is set)
//! ```

pub mod classify;
pub mod coordinator;
pub mod doctor;
pub mod executor;
pub mod process;
pub mod prompt;
pub mod request;

pub use classify::{FailureClass, classify};
pub use coordinator::{BuildError, BuildOptions, BuiltImage, ContainerBuildCoordinator, DaemonInfo};
pub use doctor::{CheckResult, DoctorReport};
pub use executor::{ExecOptions, ProcessRunner, RealRunner};
pub use process::{Availability, ProcessError, ProcessOutput};
pub use prompt::{DeclinePrompt, Prompt};
pub use request::{BuildKind, BuildRequest};
pub use tokio_util::sync::CancellationToken;
