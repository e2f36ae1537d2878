//! Echo handler used by the default server binary and the tests.
//!
//! - `count` returns how many invocations the session has seen
//! - `fail` raises a handler error with the first argument as message
//! - `reroute` moves the client to the affinity given as first argument
//! - any other method returns its argument (a list for several, null for none)
//!
//! Every invocation against a session backed by [`CounterStateProvider`]
//! increments that session's counter.

use async_trait::async_trait;

use crate::affinity::AffinityToken;
use crate::handler::{HandlerError, Invocation, InvocationHandler, InvocationOutput};
use crate::marshal::Value;
use crate::protocol::StatefulLocator;
use crate::session::{SessionState, SessionStateProvider};

/// Starts every session with an invocation counter of zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterStateProvider;

impl SessionStateProvider for CounterStateProvider {
    fn create_state(&self, _locator: &StatefulLocator) -> SessionState {
        Box::new(0u64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl InvocationHandler for EchoHandler {
    async fn handle(
        &self,
        invocation: &mut Invocation,
        output: &mut InvocationOutput,
    ) -> Result<Value, HandlerError> {
        let count = match invocation.session_mut() {
            Some(session) => match session.state_mut::<u64>() {
                Some(counter) => {
                    *counter += 1;
                    Some(*counter)
                }
                None => None,
            },
            None => None,
        };

        let first = invocation.arguments().first().cloned();
        match invocation.method_name() {
            "count" => count
                .map(|n| Value::Long(n as i64))
                .ok_or_else(|| HandlerError::illegal_state("count requires a stateful session")),
            "fail" => {
                let message = first
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or("requested failure")
                    .to_string();
                Err(HandlerError::new("com.example.EchoException", message))
            }
            "reroute" => {
                let token = first
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or_else(|| HandlerError::illegal_argument("reroute requires a token"))?;
                output.set_session_affinity(AffinityToken::new(token));
                Ok(Value::Null)
            }
            _ => Ok(match invocation.arguments() {
                [] => Value::Null,
                [single] => single.clone(),
                many => Value::List(many.to_vec()),
            }),
        }
    }
}
