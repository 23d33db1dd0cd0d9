//! HTTP middleware for the Backend API client.

use crate::utils::fmt_duration;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Calls slower than this are logged at `warn`.
const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(2);

/// Logs every backend round-trip with its status and duration.
pub struct TransactionLogger;

#[async_trait::async_trait]
impl Middleware for TransactionLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().to_string();
        let path = req.url().path().to_string();
        let start = Instant::now();

        trace!(method = %method, path = %path, "backend request");
        let result = next.run(req, extensions).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => {
                let status = response.status().as_u16();
                if elapsed > SLOW_CALL_THRESHOLD {
                    warn!(
                        method = %method,
                        path = %path,
                        status,
                        duration = fmt_duration(elapsed),
                        "slow backend call"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        status,
                        duration = fmt_duration(elapsed),
                        "backend response"
                    );
                }
            }
            Err(error) => {
                warn!(
                    method = %method,
                    path = %path,
                    error = %error,
                    duration = fmt_duration(elapsed),
                    "backend request failed"
                );
            }
        }

        result
    }
}
