//! Decomposition of one metric into named wire values.

use error_stack::ResultExt;

use crate::error::ReporterError;
use crate::error::ReporterResult;
use crate::format::format_float;
use crate::format::format_integer;
use crate::format::format_unsigned;
use crate::metric::Metered;
use crate::metric::Metric;
use crate::metric::Sampling;
use crate::metric::Summarizable;

/// One decomposed value. The wire key is `prefix + name + suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub suffix: &'static str,
    pub value: String,
}

impl Sample {
    fn new(suffix: &'static str, value: String) -> Self {
        Self { suffix, value }
    }

    /// Full metric key for this sample.
    pub fn key(&self, prefix: &str, name: &str) -> String {
        let mut key = String::with_capacity(prefix.len() + name.len() + self.suffix.len());
        key.push_str(prefix);
        key.push_str(name);
        key.push_str(self.suffix);
        key
    }
}

/// Collects samples for one metric, dropping floats with no decimal form.
struct SampleWriter<'a> {
    name: &'a str,
    samples: Vec<Sample>,
}

impl<'a> SampleWriter<'a> {
    fn new(name: &'a str, capacity: usize) -> Self {
        Self {
            name,
            samples: Vec::with_capacity(capacity),
        }
    }

    fn text(&mut self, suffix: &'static str, value: String) {
        self.samples.push(Sample::new(suffix, value));
    }

    fn float(&mut self, suffix: &'static str, value: f64) {
        match format_float(value) {
            Some(text) => self.text(suffix, text),
            None => tracing::debug!(
                msg = "Skipping non-finite value",
                metric = %self.name,
                suffix,
                value,
            ),
        }
    }

    fn metered<M: Metered + ?Sized>(&mut self, meter: &M) {
        self.text("", format_unsigned(meter.count()));
        self.float(".meanRate", meter.mean_rate());
        self.float(".1MinuteRate", meter.one_minute_rate());
        self.float(".5MinuteRate", meter.five_minute_rate());
        self.float(".15MinuteRate", meter.fifteen_minute_rate());
    }

    fn summary<S: Summarizable + ?Sized>(&mut self, summary: &S) {
        self.float(".min", summary.min());
        self.float(".max", summary.max());
        self.float(".mean", summary.mean());
        self.float(".stddev", summary.std_dev());
    }

    fn distribution<S: Sampling + ?Sized>(&mut self, sampling: &S) {
        let snapshot = sampling.snapshot();
        self.float(".median", snapshot.median());
        self.float(".75percentile", snapshot.p75());
        self.float(".95percentile", snapshot.p95());
        self.float(".98percentile", snapshot.p98());
        self.float(".99percentile", snapshot.p99());
        self.float(".999percentile", snapshot.p999());
    }

    fn finish(self) -> Vec<Sample> {
        self.samples
    }
}

/// Decompose `metric` into samples, in wire order:
///
/// - counter: the count
/// - meter: count, mean rate, 1/5/15-minute rates
/// - histogram: min, max, mean, stddev, then median and the 75/95/98/99/99.9
///   percentiles
/// - timer: the meter samples followed by the histogram samples
/// - gauge: the value if it is numeric, nothing otherwise
///
/// # Errors
///
/// Returns [`ReporterError::MetricRead`] when the metric fails to produce a
/// value (a gauge whose computation fails).
pub fn dispatch(sanitized_name: &str, metric: &Metric) -> ReporterResult<Vec<Sample>> {
    let samples = match metric {
        Metric::Counter(counter) => {
            vec![Sample::new("", format_integer(counter.count()))]
        }
        Metric::Meter(meter) => {
            let mut writer = SampleWriter::new(sanitized_name, 5);
            writer.metered(meter.as_ref());
            writer.finish()
        }
        Metric::Histogram(histogram) => {
            let mut writer = SampleWriter::new(sanitized_name, 10);
            writer.summary(histogram.as_ref());
            writer.distribution(histogram.as_ref());
            writer.finish()
        }
        Metric::Timer(timer) => {
            let mut writer = SampleWriter::new(sanitized_name, 15);
            writer.metered(timer.as_ref());
            writer.summary(timer.as_ref());
            writer.distribution(timer.as_ref());
            writer.finish()
        }
        Metric::Gauge(gauge) => {
            let value = gauge
                .value()
                .change_context_lazy(|| ReporterError::metric_read(sanitized_name))?;
            value
                .to_number()
                .and_then(|number| number.format())
                .map(|text| Sample::new("", text))
                .into_iter()
                .collect()
        }
    };
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use error_stack::Report;
    use num_bigint::BigInt;
    use rust_decimal_macros::dec;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::metric::Counting;
    use crate::metric::Gauge;
    use crate::metric::GaugeValue;
    use crate::metric::Snapshot;

    struct FixedCounter(i64);

    impl Counting for FixedCounter {
        fn count(&self) -> i64 {
            self.0
        }
    }

    struct FixedMeter;

    impl Metered for FixedMeter {
        fn count(&self) -> u64 {
            10
        }
        fn mean_rate(&self) -> f64 {
            1.50
        }
        fn one_minute_rate(&self) -> f64 {
            2.25
        }
        fn five_minute_rate(&self) -> f64 {
            3.10
        }
        fn fifteen_minute_rate(&self) -> f64 {
            4.05
        }
    }

    struct FixedHistogram;

    impl Summarizable for FixedHistogram {
        fn min(&self) -> f64 {
            1.0
        }
        fn max(&self) -> f64 {
            10.0
        }
        fn mean(&self) -> f64 {
            5.5
        }
        fn std_dev(&self) -> f64 {
            3.0276503540974917
        }
    }

    impl Sampling for FixedHistogram {
        fn snapshot(&self) -> Snapshot {
            Snapshot::new((1..=10).map(f64::from).collect())
        }
    }

    struct FixedTimer;

    impl Metered for FixedTimer {
        fn count(&self) -> u64 {
            FixedMeter.count()
        }
        fn mean_rate(&self) -> f64 {
            FixedMeter.mean_rate()
        }
        fn one_minute_rate(&self) -> f64 {
            FixedMeter.one_minute_rate()
        }
        fn five_minute_rate(&self) -> f64 {
            FixedMeter.five_minute_rate()
        }
        fn fifteen_minute_rate(&self) -> f64 {
            FixedMeter.fifteen_minute_rate()
        }
    }

    impl Summarizable for FixedTimer {
        fn min(&self) -> f64 {
            FixedHistogram.min()
        }
        fn max(&self) -> f64 {
            FixedHistogram.max()
        }
        fn mean(&self) -> f64 {
            FixedHistogram.mean()
        }
        fn std_dev(&self) -> f64 {
            FixedHistogram.std_dev()
        }
    }

    impl Sampling for FixedTimer {
        fn snapshot(&self) -> Snapshot {
            FixedHistogram.snapshot()
        }
    }

    struct FixedGauge(GaugeValue);

    impl Gauge for FixedGauge {
        fn value(&self) -> ReporterResult<GaugeValue> {
            Ok(self.0.clone())
        }
    }

    struct FailingGauge;

    impl Gauge for FailingGauge {
        fn value(&self) -> ReporterResult<GaugeValue> {
            Err(Report::new(ReporterError::configuration("pool closed")))
        }
    }

    fn pairs(samples: &[Sample]) -> Vec<(&str, &str)> {
        samples
            .iter()
            .map(|s| (s.suffix, s.value.as_str()))
            .collect()
    }

    fn gauge(value: impl Into<GaugeValue>) -> Metric {
        Metric::Gauge(Arc::new(FixedGauge(value.into())))
    }

    #[test]
    fn counter_yields_single_count() {
        let samples = dispatch("a.b.c", &Metric::Counter(Arc::new(FixedCounter(42)))).unwrap();
        assert_eq!(pairs(&samples), vec![("", "42")]);
    }

    #[test]
    fn meter_yields_count_and_rates_in_order() {
        let samples = dispatch("a.b.c", &Metric::Meter(Arc::new(FixedMeter))).unwrap();
        assert_eq!(
            pairs(&samples),
            vec![
                ("", "10"),
                (".meanRate", "1.50"),
                (".1MinuteRate", "2.25"),
                (".5MinuteRate", "3.10"),
                (".15MinuteRate", "4.05"),
            ]
        );
    }

    #[test]
    fn histogram_yields_summary_then_snapshot() {
        let samples = dispatch("a.b.c", &Metric::Histogram(Arc::new(FixedHistogram))).unwrap();
        assert_eq!(
            pairs(&samples),
            vec![
                (".min", "1.00"),
                (".max", "10.00"),
                (".mean", "5.50"),
                (".stddev", "3.03"),
                (".median", "5.50"),
                (".75percentile", "8.25"),
                (".95percentile", "10.00"),
                (".98percentile", "10.00"),
                (".99percentile", "10.00"),
                (".999percentile", "10.00"),
            ]
        );
    }

    #[test]
    fn timer_is_meter_followed_by_histogram() {
        let timer = dispatch("a.b.c", &Metric::Timer(Arc::new(FixedTimer))).unwrap();
        let meter = dispatch("a.b.c", &Metric::Meter(Arc::new(FixedMeter))).unwrap();
        let histogram = dispatch("a.b.c", &Metric::Histogram(Arc::new(FixedHistogram))).unwrap();

        assert_eq!(timer.len(), 15);
        assert_eq!(&timer[..5], &meter[..]);
        assert_eq!(&timer[5..], &histogram[..]);
    }

    #[test]
    fn gauge_formats_each_numeric_kind() {
        let cases: Vec<(Metric, &str)> = vec![
            (gauge(7i8), "7"),
            (gauge(-300i16), "-300"),
            (gauge(70_000i32), "70000"),
            (gauge(i64::MAX), "9223372036854775807"),
            (gauge(u64::MAX), "18446744073709551615"),
            (gauge(BigInt::from(10).pow(30)), "1000000000000000000000000000000"),
            (gauge(0.1f32), "0.10"),
            (gauge(2.0f64 / 3.0), "0.67"),
            (gauge(dec!(19.999)), "20.00"),
        ];
        for (metric, expected) in cases {
            let samples = dispatch("g", &metric).unwrap();
            assert_eq!(pairs(&samples), vec![("", expected)]);
        }
    }

    #[test]
    fn non_numeric_gauge_yields_nothing() {
        assert!(dispatch("g", &gauge("healthy")).unwrap().is_empty());
        assert!(dispatch("g", &gauge(true)).unwrap().is_empty());
        assert!(dispatch("g", &gauge(f64::NAN)).unwrap().is_empty());
    }

    #[test]
    fn failing_gauge_reports_metric_read() {
        let err = dispatch("pool.Pool.size", &Metric::Gauge(Arc::new(FailingGauge))).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ReporterError::MetricRead { metric } if metric == "pool.Pool.size"
        ));
    }

    struct StalledMeter;

    impl Metered for StalledMeter {
        fn count(&self) -> u64 {
            0
        }
        fn mean_rate(&self) -> f64 {
            f64::NAN
        }
        fn one_minute_rate(&self) -> f64 {
            0.0
        }
        fn five_minute_rate(&self) -> f64 {
            f64::INFINITY
        }
        fn fifteen_minute_rate(&self) -> f64 {
            0.0
        }
    }

    struct UnboundedHistogram;

    impl Summarizable for UnboundedHistogram {
        fn min(&self) -> f64 {
            f64::NEG_INFINITY
        }
        fn max(&self) -> f64 {
            1.0
        }
        fn mean(&self) -> f64 {
            f64::NAN
        }
        fn std_dev(&self) -> f64 {
            0.5
        }
    }

    impl Sampling for UnboundedHistogram {
        fn snapshot(&self) -> Snapshot {
            Snapshot::new(vec![1.0])
        }
    }

    #[test]
    fn non_finite_meter_rates_are_dropped() {
        let samples = dispatch("q.Queue.drain", &Metric::Meter(Arc::new(StalledMeter))).unwrap();
        assert_eq!(
            pairs(&samples),
            vec![("", "0"), (".1MinuteRate", "0.00"), (".15MinuteRate", "0.00")]
        );
    }

    #[test]
    fn non_finite_histogram_stats_are_dropped() {
        let samples =
            dispatch("q.Queue.depth", &Metric::Histogram(Arc::new(UnboundedHistogram))).unwrap();
        assert_eq!(samples.len(), 8);
        assert_eq!(
            pairs(&samples[..2]),
            vec![(".max", "1.00"), (".stddev", "0.50")]
        );
        assert!(samples
            .iter()
            .all(|s| s.suffix != ".min" && s.suffix != ".mean"));
        assert!(samples.iter().all(|s| s.value.parse::<f64>().unwrap().is_finite()));
    }

    #[test]
    fn sample_key_concatenates_prefix_name_suffix() {
        let sample = Sample::new(".meanRate", "1.00".to_string());
        assert_eq!(sample.key("app.", "a.b.c"), "app.a.b.c.meanRate");
        assert_eq!(sample.key("", "a.b.c"), "a.b.c.meanRate");
    }
}
