// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub const DEFAULT_TIME_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0, 180.0,
];

pub mod api {
    use super::DEFAULT_TIME_BUCKETS;
    use lazy_static::lazy_static;
    use prometheus::{
        histogram_opts, register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
    };
    use std::time::Instant;
    use tracing::{error, warn, Span};

    lazy_static! {
        static ref API_SUCCESS_SECONDS: HistogramVec = register_histogram_vec!(
            histogram_opts!(
                "api_success_seconds",
                "Duration of successfully served API requests",
                DEFAULT_TIME_BUCKETS.to_vec()
            ),
            &["api", "domain"]
        )
        .unwrap();
        static ref API_FAILURE_TOTAL: CounterVec = register_counter_vec!(
            "api_failure_total",
            "Number of failed API requests",
            &["api", "domain", "error"]
        )
        .unwrap();
    }

    /// Classifies an error for the failure counter; `is_expected` separates
    /// client-caused outcomes from ones that indicate a fault in the service.
    pub trait TraceErrorKind {
        fn trace_error_kind(&self) -> &'static str;
        fn is_expected(&self) -> bool;
    }

    impl<T: TraceErrorKind> TraceErrorKind for &T {
        fn trace_error_kind(&self) -> &'static str {
            (*self).trace_error_kind()
        }

        fn is_expected(&self) -> bool {
            (*self).is_expected()
        }
    }

    pub struct RecordedHttpApiRequest {
        pub span: Span,
        api: &'static str,
        domain: String,
        start: Instant,
    }

    impl RecordedHttpApiRequest {
        pub fn new(api: &'static str, domain: Option<&str>, span: Span) -> Self {
            Self {
                span,
                api,
                domain: domain.unwrap_or("unknown").to_string(),
                start: Instant::now(),
            }
        }

        pub fn succeed<T>(self, result: T) -> T {
            API_SUCCESS_SECONDS
                .with_label_values(&[self.api, &self.domain])
                .observe(self.start.elapsed().as_secs_f64());
            result
        }

        pub fn fail<T, K: TraceErrorKind + ?Sized>(self, result: T, error_kind: &K) -> T {
            API_FAILURE_TOTAL
                .with_label_values(&[self.api, &self.domain, error_kind.trace_error_kind()])
                .inc();
            {
                let _enter = self.span.enter();
                if error_kind.is_expected() {
                    warn!(
                        error_kind = error_kind.trace_error_kind(),
                        "API request failed"
                    );
                } else {
                    error!(
                        error_kind = error_kind.trace_error_kind(),
                        "API request failed with unexpected error"
                    );
                }
            }
            result
        }

        pub fn result<T, E: TraceErrorKind>(self, result: Result<T, E>) -> Result<T, E> {
            match result {
                Ok(value) => Ok(self.succeed(value)),
                Err(error) => {
                    let kind = error.trace_error_kind();
                    let expected = error.is_expected();
                    API_FAILURE_TOTAL
                        .with_label_values(&[self.api, &self.domain, kind])
                        .inc();
                    let _enter = self.span.enter();
                    if expected {
                        warn!(error_kind = kind, "API request failed");
                    } else {
                        error!(error_kind = kind, "API request failed with unexpected error");
                    }
                    Err(error)
                }
            }
        }
    }

    /// Opens a metrics and tracing scope for one API request. The optional
    /// leading `domain = <expr>` argument also tags the Prometheus series;
    /// all remaining fields only appear on the span.
    #[macro_export]
    macro_rules! recorded_http_api_request {
        ($api:expr, domain = $domain:expr $(, $name:ident = $value:expr)* $(,)?) => {{
            let domain: &str = &$domain;
            let span = tracing::info_span!(
                "api_request",
                api = $api,
                domain = domain
                $(, $name = tracing::field::debug(&$value))*
            );
            $crate::metrics::api::RecordedHttpApiRequest::new($api, Some(domain), span)
        }};
        ($api:expr $(, $name:ident = $value:expr)* $(,)?) => {{
            let span = tracing::info_span!(
                "api_request",
                api = $api
                $(, $name = tracing::field::debug(&$value))*
            );
            $crate::metrics::api::RecordedHttpApiRequest::new($api, None, span)
        }};
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::api::{RecordedHttpApiRequest, TraceErrorKind};
    use crate::recorded_http_api_request;

    struct TestError;

    impl TraceErrorKind for TestError {
        fn trace_error_kind(&self) -> &'static str {
            "TestError"
        }

        fn is_expected(&self) -> bool {
            true
        }
    }

    #[test]
    fn recorded_request_passes_through_results() {
        let record = recorded_http_api_request!("test_op", domain = "test-domain");
        assert_eq!(record.succeed(42), 42);

        let record = RecordedHttpApiRequest::new("test_op", None, tracing::Span::none());
        assert_eq!(record.fail(7, &TestError), 7);
    }
}
