/// Builder for the Windows Job Object limits a [`super::agent::CommandAgent`]
/// applies to its child processes, per §4.8's limits table. Each field is
/// `Option` so an unset limit is simply not applied — the supplement noted
/// in the design notes, since the source's limit set is populated
/// incrementally rather than all at once.
#[derive(Debug, Clone, Default)]
pub struct JobObjectLimits {
    /// Kills the whole job when total committed memory exceeds this.
    pub per_job_memory_bytes: Option<u64>,
    /// Kills the offending process when its committed memory exceeds this.
    pub per_process_memory_bytes: Option<u64>,
    /// Kills the job once aggregate CPU time exceeds this many minutes.
    pub per_job_cpu_minutes: Option<u64>,
    /// Kills the offending process once its own CPU time exceeds this many
    /// minutes.
    pub per_process_cpu_minutes: Option<u64>,
    /// CPU rate cap, expressed as hundredths of a percent (1..=10_000), or
    /// `None` to use weight-based scheduling instead.
    pub cpu_rate_cap_percent: Option<u32>,
    /// CPU scheduling weight (1..=9) when `cpu_rate_cap_percent` is unset.
    pub cpu_rate_weight: Option<u8>,
    /// Sends `TerminateAll` once this many milliseconds of wall-clock time
    /// have elapsed since the set started.
    pub wall_clock_ms: Option<u64>,
}

impl JobObjectLimits {
    pub fn builder() -> JobObjectLimitsBuilder {
        JobObjectLimitsBuilder::default()
    }

    pub fn has_any(&self) -> bool {
        self.per_job_memory_bytes.is_some()
            || self.per_process_memory_bytes.is_some()
            || self.per_job_cpu_minutes.is_some()
            || self.per_process_cpu_minutes.is_some()
            || self.cpu_rate_cap_percent.is_some()
            || self.cpu_rate_weight.is_some()
            || self.wall_clock_ms.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobObjectLimitsBuilder {
    limits: JobObjectLimits,
}

impl JobObjectLimitsBuilder {
    pub fn per_job_memory_bytes(mut self, bytes: u64) -> Self {
        self.limits.per_job_memory_bytes = Some(bytes);
        self
    }

    pub fn per_process_memory_bytes(mut self, bytes: u64) -> Self {
        self.limits.per_process_memory_bytes = Some(bytes);
        self
    }

    pub fn per_job_cpu_minutes(mut self, minutes: u64) -> Self {
        self.limits.per_job_cpu_minutes = Some(minutes);
        self
    }

    pub fn per_process_cpu_minutes(mut self, minutes: u64) -> Self {
        self.limits.per_process_cpu_minutes = Some(minutes);
        self
    }

    /// CPU rate cap as a plain percentage (1..=100); clears any configured
    /// weight, since the two are mutually exclusive on a job object.
    pub fn cpu_rate_cap_percent(mut self, percent: u32) -> Self {
        self.limits.cpu_rate_cap_percent = Some(percent.clamp(1, 100) * 100);
        self.limits.cpu_rate_weight = None;
        self
    }

    pub fn cpu_rate_weight(mut self, weight: u8) -> Self {
        self.limits.cpu_rate_weight = Some(weight.clamp(1, 9));
        self.limits.cpu_rate_cap_percent = None;
        self
    }

    pub fn wall_clock_ms(mut self, ms: u64) -> Self {
        self.limits.wall_clock_ms = Some(ms);
        self
    }

    pub fn build(self) -> JobObjectLimits {
        self.limits
    }
}
