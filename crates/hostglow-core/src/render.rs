//! Prometheus text exposition (format version 0.0.4).
//!
//! Renders a key-ordered snapshot into the plain text format: one
//! `# HELP` and `# TYPE` pair per metric name, then one line per label
//! set. Rates are derived values with gauge semantics, so every metric
//! is typed `gauge`. Non-finite values are omitted entirely.

use std::fmt::Write;

use crate::registry::MetricValue;

/// Content type the exposition format version is declared through.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Renders a snapshot into exposition text.
///
/// `values` must be key-ordered, which [`MetricRegistry::snapshot`]
/// guarantees; equal inputs always produce byte-identical output.
///
/// [`MetricRegistry::snapshot`]: crate::registry::MetricRegistry::snapshot
pub fn render(values: &[MetricValue]) -> String {
    let mut out = String::new();
    let mut current_name: Option<&str> = None;

    for metric in values.iter().filter(|m| m.value.is_finite()) {
        if current_name != Some(metric.key.name.as_str()) {
            // Writing to a String cannot fail.
            let _ = writeln!(
                out,
                "# HELP {} {}",
                metric.key.name,
                escape_help(metric.help)
            );
            let _ = writeln!(out, "# TYPE {} gauge", metric.key.name);
            current_name = Some(metric.key.name.as_str());
        }

        out.push_str(&metric.key.name);
        if !metric.key.labels.is_empty() {
            out.push('{');
            for (i, (k, v)) in metric.key.labels.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}=\"{}\"", k, escape_label_value(v));
            }
            out.push('}');
        }
        let _ = writeln!(out, " {}", metric.value);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MetricKey, MetricKind, MetricRegistry, MetricValue};

    fn value(name: &str, labels: Vec<(String, String)>, v: f64) -> MetricValue {
        MetricValue {
            key: MetricKey::new(name, labels),
            kind: MetricKind::Gauge,
            value: v,
            help: "help text",
            last_updated: 0.0,
        }
    }

    #[test]
    fn renders_bare_gauge() {
        let out = render(&[value("hostglow_cpu_temperature_celsius", vec![], 45.0)]);
        assert_eq!(
            out,
            "# HELP hostglow_cpu_temperature_celsius help text\n\
             # TYPE hostglow_cpu_temperature_celsius gauge\n\
             hostglow_cpu_temperature_celsius 45\n"
        );
    }

    #[test]
    fn help_and_type_once_per_name() {
        let reg = MetricRegistry::new();
        for iface in ["eth0", "lo"] {
            reg.upsert(value(
                "hostglow_network_receive_bytes_per_second",
                vec![("interface".to_string(), iface.to_string())],
                50.0,
            ));
        }

        let out = render(&reg.snapshot());
        assert_eq!(out.matches("# HELP").count(), 1);
        assert_eq!(out.matches("# TYPE").count(), 1);
        assert!(out.contains(
            "hostglow_network_receive_bytes_per_second{interface=\"eth0\"} 50\n"
        ));
        assert!(out.contains(
            "hostglow_network_receive_bytes_per_second{interface=\"lo\"} 50\n"
        ));
    }

    #[test]
    fn output_is_deterministic() {
        let reg = MetricRegistry::new();
        reg.upsert(value("b_metric", vec![], 2.0));
        reg.upsert(value(
            "a_metric",
            vec![("device".to_string(), "sda".to_string())],
            1.0,
        ));

        let first = render(&reg.snapshot());
        let second = render(&reg.snapshot());
        assert_eq!(first, second);
        // Key order puts a_metric first.
        assert!(first.find("a_metric").unwrap() < first.find("b_metric").unwrap());
    }

    #[test]
    fn non_finite_values_are_omitted() {
        let out = render(&[
            value("bad_metric", vec![], f64::NAN),
            value("good_metric", vec![], 1.0),
            value("inf_metric", vec![], f64::INFINITY),
        ]);
        assert!(!out.contains("bad_metric"));
        assert!(!out.contains("inf_metric"));
        assert!(out.contains("good_metric 1\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        let out = render(&[value(
            "m",
            vec![("device".to_string(), "we\"ird\\nm\ne".to_string())],
            1.0,
        )]);
        assert!(out.contains(r#"m{device="we\"ird\\nm\ne"} 1"#));
    }

    #[test]
    fn empty_snapshot_renders_empty() {
        assert_eq!(render(&[]), "");
    }
}
