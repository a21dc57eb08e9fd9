//! A scriptable mock transporter.

use iris_core::{Action, BoxFuture, Response};
use iris_service::{DispatchFn, EmitFn, TransportError, Transporter, TransporterOptions};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

/// A transporter that records sent actions and replies with scripted
/// responses.
///
/// Responses queued with [`MockTransporter::push_response`] are
/// consumed in order; when the queue is empty the default response is
/// returned. With listening enabled, the dispatch function handed to
/// `listen()` is captured so tests can simulate incoming requests.
pub struct MockTransporter {
    default_response: Response,
    responses: Mutex<VecDeque<Response>>,
    sent: Mutex<Vec<Action>>,
    connect_attempts: Mutex<usize>,
    fail_connect: bool,
    listening: bool,
    dispatch: Mutex<Option<DispatchFn>>,
}

impl MockTransporter {
    /// Creates a transporter answering every send with the given
    /// response.
    #[must_use]
    pub fn answering(response: Response) -> Self {
        Self {
            default_response: response,
            responses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            connect_attempts: Mutex::new(0),
            fail_connect: false,
            listening: false,
            dispatch: Mutex::new(None),
        }
    }

    /// Creates a transporter answering with `ok` and the given data.
    #[must_use]
    pub fn ok_with(data: Value) -> Self {
        Self::answering(Response::ok(Some(data)))
    }

    /// Enables listening support.
    #[must_use]
    pub fn listening(mut self) -> Self {
        self.listening = true;
        self
    }

    /// Makes every connection attempt fail.
    #[must_use]
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Queues a response for the next send.
    pub fn push_response(&self, response: Response) {
        self.responses.lock().push_back(response);
    }

    /// Returns the actions sent through this transporter so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Action> {
        self.sent.lock().clone()
    }

    /// Returns the number of connection attempts made.
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        *self.connect_attempts.lock()
    }

    /// Simulates an incoming request through the captured dispatch.
    ///
    /// Panics when `listen()` has not been called yet.
    pub async fn incoming(&self, action: Action) -> Response {
        let dispatch = self
            .dispatch
            .lock()
            .clone()
            .expect("listen() must be called before simulating incoming requests");
        (*dispatch)(action).await
    }
}

impl Transporter for MockTransporter {
    fn connect<'a>(
        &'a self,
        _options: &'a TransporterOptions,
        _auth: Option<&'a Value>,
        _connection: Option<Value>,
        _emit: &'a EmitFn,
    ) -> BoxFuture<'a, Result<Option<Value>, TransportError>> {
        Box::pin(async move {
            *self.connect_attempts.lock() += 1;
            if self.fail_connect {
                Err(TransportError::Connect("mock refused".to_string()))
            } else {
                Ok(Some(serde_json::json!({ "mock": true })))
            }
        })
    }

    fn send<'a>(
        &'a self,
        action: &'a Action,
        _connection: Option<&'a Value>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            self.sent.lock().push(action.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.default_response.clone())
        })
    }

    fn has_listen(&self) -> bool {
        self.listening
    }

    fn listen<'a>(
        &'a self,
        dispatch: DispatchFn,
        _connection: Option<&'a Value>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            *self.dispatch.lock() = Some(dispatch);
            Response::ok(None)
        })
    }

    fn disconnect<'a>(&'a self, _connection: Option<Value>) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::Status;

    #[tokio::test]
    async fn test_scripted_responses_are_consumed_in_order() {
        let transporter = MockTransporter::ok_with(serde_json::json!([]));
        transporter.push_response(Response::with_status(Status::Notfound));

        let action = Action::new("GET");
        let first = transporter.send(&action, None).await;
        assert_eq!(first.status, Some(Status::Notfound));

        let second = transporter.send(&action, None).await;
        assert_eq!(second.status, Some(Status::Ok));
        assert_eq!(transporter.sent().len(), 2);
    }
}
