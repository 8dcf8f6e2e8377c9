//! Single-primitive strategies.

use crate::utils::{busy_wait, coarse_wait, TimeSource};

use super::{Strategy, WaitRequest, WaitResult, Waiter};

/// Suspend for the whole target. Cheap on CPU, imprecise.
#[derive(Debug, Clone)]
pub struct CoarseWaiter<S> {
    source: S,
}

impl<S: TimeSource> CoarseWaiter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: TimeSource> Waiter for CoarseWaiter<S> {
    fn strategy(&self) -> Strategy {
        Strategy::Coarse
    }

    fn wait(&mut self, request: &WaitRequest) -> WaitResult {
        let actual = coarse_wait(&self.source, request.target());
        WaitResult::new(request.target(), actual)
    }
}

/// Spin for the whole target. Precise, burns a core.
#[derive(Debug, Clone)]
pub struct FineWaiter<S> {
    source: S,
}

impl<S: TimeSource> FineWaiter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: TimeSource> Waiter for FineWaiter<S> {
    fn strategy(&self) -> Strategy {
        Strategy::Fine
    }

    fn wait(&mut self, request: &WaitRequest) -> WaitResult {
        let actual = busy_wait(&self.source, request.target());
        WaitResult::new(request.target(), actual)
    }
}
