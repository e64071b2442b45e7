use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, KeyName, Unit};
use std::fmt::{Display, Formatter};

pub(crate) mod measure_execution_time;

pub(crate) use measure_execution_time::Measure;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl Display for MetricType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricType::Counter => write!(f, "Counter"),
            MetricType::Gauge => write!(f, "Gauge"),
            MetricType::Histogram => write!(f, "Histogram"),
        }
    }
}

pub(crate) struct StaticMetric {
    pub(crate) metric_name: &'static str,
    unit: Unit,
    description: &'static str,
    metric_type: MetricType,
}

impl From<StaticMetric> for KeyName {
    fn from(value: StaticMetric) -> Self {
        KeyName::from(value.metric_name)
    }
}

impl StaticMetric {
    fn describe(&self) {
        match self.metric_type {
            MetricType::Counter => describe_counter!(self.metric_name, self.unit, self.description),
            MetricType::Gauge => describe_gauge!(self.metric_name, self.unit, self.description),
            MetricType::Histogram => describe_histogram!(self.metric_name, self.unit, self.description),
        }
    }

    pub(crate) fn increment(&self) {
        self.increment_by(1);
    }

    pub(crate) fn increment_by(&self, value: u64) {
        debug_assert_eq!(self.metric_type, MetricType::Counter, "{} is not a counter", self.metric_name);
        counter!(self.metric_name).increment(value);
    }

    pub(crate) fn gauge(&self, value: f64) {
        debug_assert_eq!(self.metric_type, MetricType::Gauge, "{} is not a gauge", self.metric_name);
        gauge!(self.metric_name).set(value);
    }
}

pub(crate) const REQUESTS_ENQUEUED: StaticMetric = StaticMetric {
    metric_name: "queue.request.enqueued.count",
    unit: Unit::Count,
    description: "The number of requests accepted into the queue",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_REJECTED: StaticMetric = StaticMetric {
    metric_name: "queue.request.rejected.count",
    unit: Unit::Count,
    description: "The number of requests rejected because the session was not connected",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_DISPATCHED: StaticMetric = StaticMetric {
    metric_name: "queue.request.dispatched.count",
    unit: Unit::Count,
    description: "The number of requests handed to the executor",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_COMPLETED: StaticMetric = StaticMetric {
    metric_name: "queue.request.completed.count",
    unit: Unit::Count,
    description: "The number of requests completed successfully",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_FAILED: StaticMetric = StaticMetric {
    metric_name: "queue.request.failed.count",
    unit: Unit::Count,
    description: "The number of requests the executor reported as failed",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_SKIPPED: StaticMetric = StaticMetric {
    metric_name: "queue.request.skipped.count",
    unit: Unit::Count,
    description: "The number of virtual requests skipped for lack of a target",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_DROPPED: StaticMetric = StaticMetric {
    metric_name: "queue.request.dropped.count",
    unit: Unit::Count,
    description: "The number of requests dropped by a disconnect",
    metric_type: MetricType::Counter,
};

pub(crate) const PENDING_REQUESTS: StaticMetric = StaticMetric {
    metric_name: "queue.pending.size",
    unit: Unit::Count,
    description: "The number of requests waiting behind the one in flight",
    metric_type: MetricType::Gauge,
};

pub(crate) const OPERATION_DURATION: StaticMetric = StaticMetric {
    metric_name: "queue.operation.duration",
    unit: Unit::Milliseconds,
    description: "The time the executor spends on a single operation",
    metric_type: MetricType::Histogram,
};

pub(crate) const CONNECTING_DURATION: StaticMetric = StaticMetric {
    metric_name: "queue.peripheral.connecting.duration",
    unit: Unit::Milliseconds,
    description: "The time spent connecting peripheral",
    metric_type: MetricType::Histogram,
};

pub(crate) const SERVICE_DISCOVERY_DURATION: StaticMetric = StaticMetric {
    metric_name: "queue.peripheral.discovery.duration",
    unit: Unit::Milliseconds,
    description: "The time spent discovering services",
    metric_type: MetricType::Histogram,
};

pub(crate) fn describe_metrics() {
    REQUESTS_ENQUEUED.describe();
    REQUESTS_REJECTED.describe();
    REQUESTS_DISPATCHED.describe();
    REQUESTS_COMPLETED.describe();
    REQUESTS_FAILED.describe();
    REQUESTS_SKIPPED.describe();
    REQUESTS_DROPPED.describe();
    PENDING_REQUESTS.describe();
    OPERATION_DURATION.describe();
    CONNECTING_DURATION.describe();
    SERVICE_DISCOVERY_DURATION.describe();
}
