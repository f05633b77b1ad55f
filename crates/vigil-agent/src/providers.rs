// ABOUTME: Collaborator seams the session engine pulls data from.
// ABOUTME: Sysinfo/metrics/diagnostics traits plus implementations backed by the sysinfo crate.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};

use vigil_proto::MetricsPayload;

/// How many processes a `processes` diagnostic reports, busiest first.
pub const PROCESS_LIMIT: usize = 30;

/// Supplies the one-shot system descriptor sent with `auth`.
pub trait SysinfoProvider: Send + Sync {
    fn describe(&self) -> Value;
}

/// Supplies the periodic metrics sample. Called at send time, every tick.
pub trait MetricsProvider: Send + Sync {
    fn sample(&self) -> MetricsPayload;
}

/// Answers on-demand diagnostic requests, keyed by `req_type`.
///
/// `None` means the request type is unknown to this provider; the session
/// turns that into an error response so the issuer is never left hanging.
#[async_trait]
pub trait DiagnosticsProvider: Send + Sync {
    async fn handle(&self, req_type: &str, data: &Value) -> Option<Value>;
}

/// The full set of collaborators a session needs.
#[derive(Clone)]
pub struct Providers {
    pub sysinfo: Arc<dyn SysinfoProvider>,
    pub metrics: Arc<dyn MetricsProvider>,
    pub diagnostics: Arc<dyn DiagnosticsProvider>,
}

impl Providers {
    /// Providers backed by the local host via the sysinfo crate.
    pub fn system() -> Self {
        let sysinfo: Arc<dyn SysinfoProvider> = Arc::new(HostDescriptor);
        let metrics: Arc<dyn MetricsProvider> = Arc::new(SystemMetrics::new());
        let diagnostics: Arc<dyn DiagnosticsProvider> = Arc::new(SystemDiagnostics {
            sysinfo: Arc::clone(&sysinfo),
            metrics: Arc::clone(&metrics),
        });
        Self {
            sysinfo,
            metrics,
            diagnostics,
        }
    }
}

/// Host descriptor: hostname, OS name/version, architecture.
pub struct HostDescriptor;

impl SysinfoProvider for HostDescriptor {
    fn describe(&self) -> Value {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let os = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => format!("{name} {version}"),
            (Some(name), None) => name,
            _ => std::env::consts::OS.to_string(),
        };
        json!({
            "hostname": hostname,
            "os": os,
            "arch": std::env::consts::ARCH,
        })
    }
}

/// CPU/memory/disk percentages sampled from a persistent `System`.
///
/// CPU usage is measured between consecutive refreshes, so the very first
/// sample after startup reads 0; the 2s cadence makes later samples real.
pub struct SystemMetrics {
    system: Mutex<System>,
}

impl SystemMetrics {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for SystemMetrics {
    fn sample(&self) -> MetricsPayload {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu_percent = Some(f64::from(system.global_cpu_usage()));
        let mem_percent = if system.total_memory() > 0 {
            Some(system.used_memory() as f64 / system.total_memory() as f64 * 100.0)
        } else {
            None
        };

        MetricsPayload {
            cpu_percent,
            mem_percent,
            disk_percent: disk_percent(),
        }
    }
}

fn disk_percent() -> Option<f64> {
    let disks = Disks::new_with_refreshed_list();
    let mut total: u64 = 0;
    let mut available: u64 = 0;
    for disk in disks.list() {
        total += disk.total_space();
        available += disk.available_space();
    }
    if total == 0 {
        return None;
    }
    Some((total - available) as f64 / total as f64 * 100.0)
}

/// Diagnostics backed by the local host: sysinfo, processes, netstat.
pub struct SystemDiagnostics {
    sysinfo: Arc<dyn SysinfoProvider>,
    metrics: Arc<dyn MetricsProvider>,
}

impl SystemDiagnostics {
    pub fn new(sysinfo: Arc<dyn SysinfoProvider>, metrics: Arc<dyn MetricsProvider>) -> Self {
        Self { sysinfo, metrics }
    }
}

#[async_trait]
impl DiagnosticsProvider for SystemDiagnostics {
    async fn handle(&self, req_type: &str, _data: &Value) -> Option<Value> {
        match req_type {
            "sysinfo" => Some(json!({
                "sysinfo": self.sysinfo.describe(),
                "metrics": serde_json::to_value(self.metrics.sample()).unwrap_or(Value::Null),
            })),
            "processes" => {
                // Process enumeration walks /proc; keep it off the reactor.
                let procs = tokio::task::spawn_blocking(|| top_processes(PROCESS_LIMIT)).await;
                match procs {
                    Ok(list) => Some(json!({ "processes": list })),
                    Err(err) => Some(json!({ "error": format!("failed to list processes: {err}") })),
                }
            }
            "netstat" => Some(json!({ "networks": network_counters() })),
            _ => None,
        }
    }
}

fn top_processes(limit: usize) -> Vec<Value> {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let total_memory = system.total_memory();
    let mut rows: Vec<(f64, Value)> = system
        .processes()
        .iter()
        .map(|(pid, process)| {
            let cpu = f64::from(process.cpu_usage());
            let mem_percent = if total_memory > 0 {
                process.memory() as f64 / total_memory as f64 * 100.0
            } else {
                0.0
            };
            let row = json!({
                "pid": pid.as_u32(),
                "name": process.name().to_string_lossy(),
                "cpu_percent": cpu,
                "memory_percent": mem_percent,
            });
            (cpu, row)
        })
        .collect();

    rows.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    rows.into_iter().take(limit).map(|(_, row)| row).collect()
}

fn network_counters() -> Vec<Value> {
    let networks = Networks::new_with_refreshed_list();
    networks
        .iter()
        .map(|(name, data)| {
            json!({
                "interface": name,
                "received": data.total_received(),
                "transmitted": data.total_transmitted(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_has_required_fields() {
        let descriptor = HostDescriptor.describe();
        assert!(descriptor["hostname"].is_string());
        assert!(descriptor["os"].is_string());
        assert!(descriptor["arch"].is_string());
    }

    #[test]
    fn metrics_sample_is_bounded() {
        let metrics = SystemMetrics::new();
        let sample = metrics.sample();
        if let Some(mem) = sample.mem_percent {
            assert!((0.0..=100.0).contains(&mem));
        }
        if let Some(disk) = sample.disk_percent {
            assert!((0.0..=100.0).contains(&disk));
        }
    }

    #[tokio::test]
    async fn unknown_req_type_is_none() {
        let providers = Providers::system();
        let result = providers
            .diagnostics
            .handle("bogus", &Value::Null)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn sysinfo_diagnostic_bundles_descriptor_and_metrics() {
        let providers = Providers::system();
        let result = providers
            .diagnostics
            .handle("sysinfo", &Value::Null)
            .await
            .expect("sysinfo is a known req_type");
        assert!(result["sysinfo"]["hostname"].is_string());
        assert!(result["metrics"].is_object());
    }

    #[tokio::test]
    async fn processes_diagnostic_is_bounded() {
        let providers = Providers::system();
        let result = providers
            .diagnostics
            .handle("processes", &Value::Null)
            .await
            .expect("processes is a known req_type");
        let list = result["processes"].as_array().expect("array of processes");
        assert!(list.len() <= PROCESS_LIMIT);
    }
}
