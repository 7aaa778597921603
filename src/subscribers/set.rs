//! # Ordered fan-out to subscribers.
//!
//! Each event is delivered to every subscriber in registration order. A
//! panicking subscriber is logged and skipped; the others still see the event.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::error;

use super::Subscribe;
use crate::commands::CommandContext;
use crate::error::CommandError;
use crate::types::ReadyEvent;

#[derive(Default, Clone)]
pub struct SubscriberSet {
    subs: Vec<Arc<dyn Subscribe>>,
}

impl SubscriberSet {
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self { subs }
    }

    pub fn push(&mut self, sub: Arc<dyn Subscribe>) {
        self.subs.push(sub);
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub async fn ready(&self, ready: &ReadyEvent) {
        for sub in &self.subs {
            isolate(sub.name(), "on_ready", sub.on_ready(ready)).await;
        }
    }

    pub async fn command_completed(&self, ctx: &CommandContext) {
        for sub in &self.subs {
            isolate(
                sub.name(),
                "on_command_completed",
                sub.on_command_completed(ctx),
            )
            .await;
        }
    }

    pub async fn command_error(&self, ctx: &CommandContext, err: &CommandError) {
        for sub in &self.subs {
            isolate(
                sub.name(),
                "on_command_error",
                sub.on_command_error(ctx, err),
            )
            .await;
        }
    }
}

async fn isolate(name: &'static str, event: &'static str, fut: impl Future<Output = ()>) {
    if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
        error!(
            subscriber = name,
            event,
            info = %panic_message(&*panic),
            "subscriber panicked"
        );
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{message, LogCapture, RecordingMessenger};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::Level;

    struct Panics;

    #[async_trait]
    impl Subscribe for Panics {
        async fn on_command_completed(&self, _ctx: &CommandContext) {
            panic!("subscriber bug");
        }

        fn name(&self) -> &'static str {
            "panics"
        }
    }

    #[derive(Default)]
    struct Counts(AtomicUsize);

    #[async_trait]
    impl Subscribe for Counts {
        async fn on_command_completed(&self, _ctx: &CommandContext) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx() -> CommandContext {
        CommandContext {
            message: message("1", "?ping"),
            invoked_with: "ping".into(),
            args: vec![],
            messenger: Arc::new(RecordingMessenger::default()),
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_starve_the_rest() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        let counts = Arc::new(Counts::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Panics), counts.clone()];
        let set = SubscriberSet::new(subs);
        set.command_completed(&ctx()).await;

        assert_eq!(counts.0.load(Ordering::SeqCst), 1);
        assert_eq!(logs.count(Level::ERROR, "subscriber panicked"), 1);
    }

    struct Named(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Subscribe for Named {
        async fn on_command_completed(&self, _ctx: &CommandContext) {
            self.1.lock().unwrap().push(self.0);
        }
    }

    #[tokio::test]
    async fn pushed_subscribers_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut set = SubscriberSet::default();
        assert!(set.is_empty());

        set.push(Arc::new(Named("first", order.clone())));
        set.push(Arc::new(Named("second", order.clone())));
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());

        set.command_completed(&ctx()).await;
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
