//! Prometheus text exposition format.

use scalegrid_autoscale::{ScalePhase, WorkloadStatus};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const PHASES: [ScalePhase; 4] = [
    ScalePhase::Idle,
    ScalePhase::ScalingUp,
    ScalePhase::Stable,
    ScalePhase::CoolingDown,
];

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} {kind}\n"));
}

/// Escape a label value: backslash, double quote and newline.
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Render workload statuses into Prometheus text format.
///
/// Workload gauges carry a `workload` label; trigger gauges add a
/// `metric` label with the trigger's qualified metric name.
pub fn render_prometheus(statuses: &[WorkloadStatus]) -> String {
    let mut out = String::new();

    header(
        &mut out,
        "scalegrid_workload_active",
        "Whether any trigger of the workload is active (0 or 1).",
        "gauge",
    );
    for s in statuses {
        out.push_str(&format!(
            "scalegrid_workload_active{{workload=\"{}\"}} {}\n",
            escape(&s.workload_id),
            u8::from(s.desired_active)
        ));
    }

    header(
        &mut out,
        "scalegrid_workload_replicas",
        "Replica count last requested for the workload.",
        "gauge",
    );
    for s in statuses {
        out.push_str(&format!(
            "scalegrid_workload_replicas{{workload=\"{}\"}} {}\n",
            escape(&s.workload_id),
            s.current_replicas
        ));
    }

    header(
        &mut out,
        "scalegrid_workload_phase",
        "Current scaling phase (1 for the active phase).",
        "gauge",
    );
    for s in statuses {
        for phase in PHASES {
            out.push_str(&format!(
                "scalegrid_workload_phase{{workload=\"{}\",phase=\"{}\"}} {}\n",
                escape(&s.workload_id),
                phase,
                u8::from(s.phase == phase)
            ));
        }
    }

    header(
        &mut out,
        "scalegrid_scaler_metric_value",
        "Last value reported by a trigger.",
        "gauge",
    );
    for s in statuses {
        for t in &s.triggers {
            if let Some(value) = t.value {
                out.push_str(&format!(
                    "scalegrid_scaler_metric_value{{workload=\"{}\",metric=\"{}\"}} {}\n",
                    escape(&s.workload_id),
                    escape(&t.metric_name),
                    value
                ));
            }
        }
    }

    header(
        &mut out,
        "scalegrid_scaler_active",
        "Whether a trigger reported active on the last tick (0 or 1).",
        "gauge",
    );
    for s in statuses {
        for t in &s.triggers {
            out.push_str(&format!(
                "scalegrid_scaler_active{{workload=\"{}\",metric=\"{}\"}} {}\n",
                escape(&s.workload_id),
                escape(&t.metric_name),
                u8::from(t.is_active)
            ));
        }
    }

    header(
        &mut out,
        "scalegrid_scaler_errors",
        "Whether a trigger failed on the last tick (0 or 1).",
        "gauge",
    );
    for s in statuses {
        for t in &s.triggers {
            out.push_str(&format!(
                "scalegrid_scaler_errors{{workload=\"{}\",metric=\"{}\"}} {}\n",
                escape(&s.workload_id),
                escape(&t.metric_name),
                u8::from(t.error.is_some())
            ));
        }
    }

    header(
        &mut out,
        "scalegrid_scaler_registration_failures",
        "Triggers of the workload that could not be built.",
        "gauge",
    );
    for s in statuses {
        out.push_str(&format!(
            "scalegrid_scaler_registration_failures{{workload=\"{}\"}} {}\n",
            escape(&s.workload_id),
            s.registration_failures.len()
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use scalegrid_autoscale::{RegistrationFailure, TriggerOutcome};

    use super::*;

    fn test_status(workload_id: &str) -> WorkloadStatus {
        WorkloadStatus {
            workload_id: workload_id.to_string(),
            generation: 3,
            phase: ScalePhase::Stable,
            desired_active: true,
            current_replicas: 4,
            min_replicas: 0,
            max_replicas: 10,
            seconds_since_active: 0,
            cooldown_remaining_secs: None,
            triggers: vec![
                TriggerOutcome {
                    scaler_index: 0,
                    label: "metrics-api[0]".to_string(),
                    metric_name: "s0-metric-api-value".to_string(),
                    is_active: true,
                    value: Some(17),
                    error: None,
                },
                TriggerOutcome {
                    scaler_index: 1,
                    label: "metrics-api[1]".to_string(),
                    metric_name: "s1-metric-api-depth".to_string(),
                    is_active: false,
                    value: None,
                    error: Some("timed out after 3000ms".to_string()),
                },
            ],
            registration_failures: vec![RegistrationFailure {
                scaler_index: 2,
                label: "kafka[2]".to_string(),
                error: "unknown trigger type \"kafka\"".to_string(),
            }],
        }
    }

    #[test]
    fn render_empty() {
        let output = render_prometheus(&[]);
        assert!(output.contains("# HELP scalegrid_workload_active"));
        assert!(output.contains("# TYPE scalegrid_scaler_errors gauge"));
    }

    #[test]
    fn render_single_workload() {
        let output = render_prometheus(&[test_status("default/api")]);

        assert!(output.contains("scalegrid_workload_active{workload=\"default/api\"} 1"));
        assert!(output.contains("scalegrid_workload_replicas{workload=\"default/api\"} 4"));
        assert!(output.contains(
            "scalegrid_workload_phase{workload=\"default/api\",phase=\"stable\"} 1"
        ));
        assert!(output.contains(
            "scalegrid_workload_phase{workload=\"default/api\",phase=\"idle\"} 0"
        ));
        assert!(output.contains(
            "scalegrid_scaler_metric_value{workload=\"default/api\",metric=\"s0-metric-api-value\"} 17"
        ));
        assert!(output.contains(
            "scalegrid_scaler_active{workload=\"default/api\",metric=\"s1-metric-api-depth\"} 0"
        ));
        assert!(output.contains(
            "scalegrid_scaler_errors{workload=\"default/api\",metric=\"s1-metric-api-depth\"} 1"
        ));
        assert!(output.contains(
            "scalegrid_scaler_registration_failures{workload=\"default/api\"} 1"
        ));
    }

    #[test]
    fn failed_trigger_has_no_value_sample() {
        let output = render_prometheus(&[test_status("default/api")]);
        assert!(!output.contains("scalegrid_scaler_metric_value{workload=\"default/api\",metric=\"s1-"));
    }

    #[test]
    fn label_values_are_escaped() {
        let output = render_prometheus(&[test_status("ns/we\"ird")]);
        assert!(output.contains("workload=\"ns/we\\\"ird\""));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let output = render_prometheus(&[test_status("a/b"), test_status("c/d")]);
        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            assert!(
                line.contains('{') && line.contains('}'),
                "line should have labels: {line}"
            );
            let value = line.rsplit(' ').next().unwrap();
            assert!(value.parse::<f64>().is_ok(), "bad sample value: {line}");
        }
    }
}
