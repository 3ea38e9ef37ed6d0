//! Prometheus metrics for the relay loop.
//!
//! Without an installed recorder every helper is a no-op, so the loop records
//! unconditionally and the binary decides whether to export.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::{relay_loop::ConnectionState, transport::DeliveryOutcome};

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        "bridge_oracle_events_total",
        "Deposit events by final outcome"
    );
    describe_counter!(
        "bridge_oracle_delivery_attempts_total",
        "Relay delivery attempts by result"
    );
    describe_histogram!(
        "bridge_oracle_delivery_duration_seconds",
        "Duration of a single relay delivery attempt in seconds"
    );
    describe_counter!(
        "bridge_oracle_state_transitions_total",
        "Connection state machine transitions"
    );
    describe_gauge!(
        "bridge_oracle_poll_cursor",
        "Block number of the last fully dispatched deposit"
    );
}

/// Final outcome of one log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventOutcome {
    Delivered,
    Dropped,
    Skipped,
    Duplicate,
}

impl EventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Dropped => "dropped",
            Self::Skipped => "skipped",
            Self::Duplicate => "duplicate",
        }
    }
}

pub(crate) fn record_event(outcome: EventOutcome) {
    counter!("bridge_oracle_events_total", "outcome" => outcome.as_str()).increment(1);
}

pub(crate) fn record_delivery_attempt(outcome: &DeliveryOutcome, duration: Duration) {
    let result = match outcome {
        DeliveryOutcome::Delivered => "delivered",
        DeliveryOutcome::TransientFailure(_) => "transient",
        DeliveryOutcome::PermanentFailure(_) => "permanent",
    };
    counter!("bridge_oracle_delivery_attempts_total", "result" => result).increment(1);
    histogram!("bridge_oracle_delivery_duration_seconds").record(duration.as_secs_f64());
}

pub(crate) fn record_transition(from: ConnectionState, to: ConnectionState) {
    counter!(
        "bridge_oracle_state_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub(crate) fn record_cursor(block_number: u64) {
    gauge!("bridge_oracle_poll_cursor").set(block_number as f64);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use metrics_exporter_prometheus::PrometheusBuilder;

    use crate::{
        metrics::{
            EventOutcome, describe_metrics, record_cursor, record_delivery_attempt, record_event,
            record_transition,
        },
        relay_loop::ConnectionState,
        transport::DeliveryOutcome,
    };

    #[test]
    fn test_metrics_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            record_event(EventOutcome::Delivered);
            record_event(EventOutcome::Delivered);
            record_event(EventOutcome::Skipped);
            record_delivery_attempt(
                &DeliveryOutcome::TransientFailure("503".into()),
                Duration::from_millis(5),
            );
            record_transition(ConnectionState::Connected, ConnectionState::Disconnected);
            record_cursor(101);
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"bridge_oracle_events_total{outcome="delivered"} 2"#));
        assert!(rendered.contains(r#"bridge_oracle_events_total{outcome="skipped"} 1"#));
        assert!(rendered.contains(r#"bridge_oracle_delivery_attempts_total{result="transient"} 1"#));
        assert!(rendered.contains(
            r#"bridge_oracle_state_transitions_total{from="connected",to="disconnected"} 1"#
        ));
        assert!(rendered.contains("bridge_oracle_poll_cursor 101"));
    }
}
