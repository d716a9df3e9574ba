/// Runtime-wide configuration for the container driver.
///
/// Constructed once from [`sandbox_types`]-level environment parsing (see the
/// `sandbox-web` crate's `Config`) and shared by every [`crate::ContainerDriver`].
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Pinned image new containers are created from.
    pub image: String,
    /// Base URL the in-container shell hook posts fs-events to.
    pub ide_api_base: String,
    /// Memory cap in bytes. Spec default: 1 GiB.
    pub memory_bytes: i64,
    /// CPU quota in microseconds per `cpu_period_us`. Spec default: 50,000.
    pub cpu_quota_us: i64,
    /// CPU accounting period in microseconds. Spec default: 100,000.
    pub cpu_period_us: i64,
    /// Seconds to wait for a container to reach `running` before healing/failing.
    pub start_timeout_secs: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: "sandbox-terminal:latest".to_string(),
            ide_api_base: "http://host.docker.internal:8000".to_string(),
            memory_bytes: 1024 * 1024 * 1024,
            cpu_quota_us: 50_000,
            cpu_period_us: 100_000,
            start_timeout_secs: 30,
        }
    }
}
