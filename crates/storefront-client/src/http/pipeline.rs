//! The request pipeline: one logical call as an explicit state machine
//!
//! ```text
//! Attaching -> Dispatching -> Classifying -+-> Retrying -------> Dispatching
//!                                          +-> RefreshingAuth -> Attaching
//!                                          +-> Terminal
//! ```
//!
//! The attempt counter and the timeout budget live on the
//! [`RequestDescriptor`] and only change in the `Retrying` transition.

use super::{ApiResponse, CancelHandle, Outcome, RequestDescriptor, Transport, TransportError};
use crate::auth::{AuthGeneration, TokenManager};
use crate::error::{Error, Result, classify, status_message};
use crate::observability::{RequestMetadata, RequestTimer, ResponseMetadata};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::FailureKind;
use storefront_core::retry::{BackoffStrategy, RetryDecision};
use tracing::{Instrument, info_span, warn};

/// Drives descriptors through attach, dispatch, classify and retry.
///
/// Cheap to clone; every clone shares the transport, policy and token manager.
#[derive(Debug, Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    backoff: Arc<dyn BackoffStrategy>,
    tokens: Arc<TokenManager>,
    marker: String,
}

enum State {
    Attaching,
    Dispatching {
        presented: Option<AuthGeneration>,
    },
    Classifying {
        outcome: Outcome,
        presented: Option<AuthGeneration>,
    },
    RefreshingAuth {
        presented: AuthGeneration,
        status: Option<u16>,
    },
    Retrying {
        kind: FailureKind,
        delay: Duration,
        timeout: Option<Duration>,
    },
    Terminal(Result<ApiResponse>),
}

impl Pipeline {
    /// Assemble a pipeline.
    ///
    /// `marker` is the payload value that flags a 4xx as an expired token.
    pub fn new(
        transport: Arc<dyn Transport>,
        backoff: Arc<dyn BackoffStrategy>,
        tokens: Arc<TokenManager>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            backoff,
            tokens,
            marker: marker.into(),
        }
    }

    /// Get the token manager.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Get the transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Run one logical call to its terminal result.
    ///
    /// Intermediate attempts are never surfaced. If `cancel` fires, the
    /// pending dispatch or backoff sleep is dropped and
    /// [`Error::Cancelled`] is returned; a refresh this call joined keeps
    /// running for its other waiters.
    pub async fn execute(
        &self,
        descriptor: RequestDescriptor,
        cancel: Option<&CancelHandle>,
    ) -> Result<ApiResponse> {
        let span = info_span!(
            "api_request",
            request_id = %descriptor.request_id,
            method = %descriptor.method,
            path = %descriptor.path,
        );
        let run = self.run(descriptor).instrument(span);

        match cancel {
            Some(handle) => {
                tokio::select! {
                    biased;
                    _ = handle.cancelled() => Err(Error::Cancelled),
                    result = run => result,
                }
            }
            None => run.await,
        }
    }

    async fn run(&self, mut descriptor: RequestDescriptor) -> Result<ApiResponse> {
        let meta = RequestMetadata::new(
            descriptor.request_id,
            descriptor.method.as_str(),
            descriptor.path.clone(),
        );
        let timer = RequestTimer::start();
        let mut refreshed = false;
        let mut state = State::Attaching;

        loop {
            state = match state {
                State::Attaching => {
                    let presented = if descriptor.skip_auth {
                        descriptor.headers.remove(http::header::AUTHORIZATION);
                        None
                    } else {
                        Some(self.tokens.attach(&mut descriptor).await)
                    };
                    State::Dispatching { presented }
                }

                State::Dispatching { presented } => {
                    meta.log_dispatch(descriptor.attempt, descriptor.timeout);
                    let outcome = self.dispatch(&descriptor).await;
                    State::Classifying { outcome, presented }
                }

                State::Classifying { outcome, presented } => {
                    match classify(&outcome, descriptor.timeout, &self.marker) {
                        None => State::Terminal(self.succeed(outcome, &descriptor, &meta, &timer)),

                        Some(FailureKind::AuthExpired) => match presented {
                            Some(presented) if !refreshed => State::RefreshingAuth {
                                presented,
                                status: outcome.as_ref().ok().map(|r| r.status().as_u16()),
                            },
                            _ => State::Terminal(Err(Error::from_outcome(
                                FailureKind::AuthExpired,
                                &outcome,
                                descriptor.timeout,
                            ))),
                        },

                        Some(kind) => match self.backoff.decide(kind, descriptor.attempt) {
                            RetryDecision::RetryAfter { delay, timeout } => State::Retrying {
                                kind,
                                delay,
                                timeout,
                            },
                            RetryDecision::GiveUp => State::Terminal(Err(Error::from_outcome(
                                kind,
                                &outcome,
                                descriptor.timeout,
                            ))),
                        },
                    }
                }

                State::RefreshingAuth { presented, status } => {
                    match self.tokens.handle_auth_expired(presented).await {
                        Ok(()) => {
                            refreshed = true;
                            meta.log_reauthenticated();
                            State::Attaching
                        }
                        Err(err) => {
                            warn!(error = %err, "re-authentication failed");
                            State::Terminal(Err(Error::Authentication {
                                status,
                                message: status_message(401).to_string(),
                            }))
                        }
                    }
                }

                State::Retrying {
                    kind,
                    delay,
                    timeout,
                } => {
                    if let Some(timeout) = timeout {
                        descriptor.timeout = descriptor.timeout.max(timeout);
                    }
                    descriptor.attempt += 1;
                    meta.log_retry(kind, descriptor.attempt, delay, descriptor.timeout);
                    tokio::time::sleep(delay).await;
                    State::Dispatching {
                        presented: self.reattach(&mut descriptor).await,
                    }
                }

                State::Terminal(result) => {
                    if let Err(err) = &result {
                        ResponseMetadata::new(err.status(), timer.elapsed())
                            .with_retries(descriptor.attempt)
                            .log_error(&meta, err.kind_label(), &err.to_string());
                    }
                    return result;
                }
            };
        }
    }

    async fn dispatch(&self, descriptor: &RequestDescriptor) -> Outcome {
        tokio::time::timeout(descriptor.timeout, self.transport.send(descriptor))
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }

    /// Pick up a credential replaced while this call was backing off.
    async fn reattach(&self, descriptor: &mut RequestDescriptor) -> Option<AuthGeneration> {
        if descriptor.skip_auth {
            None
        } else {
            Some(self.tokens.attach(descriptor).await)
        }
    }

    fn succeed(
        &self,
        outcome: Outcome,
        descriptor: &RequestDescriptor,
        meta: &RequestMetadata,
        timer: &RequestTimer,
    ) -> Result<ApiResponse> {
        let response = outcome.map_err(|e| Error::Unknown {
            status: None,
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let api = ApiResponse::from_response(response, descriptor.attempt, timer.elapsed())?;

        ResponseMetadata::new(Some(status), api.elapsed())
            .with_retries(descriptor.attempt)
            .log_success(meta);
        Ok(api)
    }
}
