//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Process log events for console echo
//!
//! [`EchoLayer`] is a `tracing_subscriber` layer that republishes every event
//! on a broadcast channel owned by a [`LogEventSource`]. The telnet server
//! holds a receiver only while it has live connections.

use chrono::{DateTime, Local};
use std::fmt::{self, Write};
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A captured log event
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl LogEvent {
    /// Render the event as a console echo line
    pub fn echo_line(&self) -> String {
        format!(
            "{} {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level,
            self.message
        )
    }
}

/// Broadcast source of log events
#[derive(Debug, Clone)]
pub struct LogEventSource {
    sender: broadcast::Sender<LogEvent>,
}

impl LogEventSource {
    /// Create a source buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Start receiving events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event to every subscriber
    pub fn publish(&self, event: LogEvent) {
        // No subscribers is the common case
        let _ = self.sender.send(event);
    }

    /// A layer feeding this source
    pub fn layer(&self) -> EchoLayer {
        EchoLayer {
            source: self.clone(),
        }
    }
}

/// `tracing_subscriber` layer publishing into a [`LogEventSource`]
#[derive(Debug, Clone)]
pub struct EchoLayer {
    source: LogEventSource,
}

impl<S: Subscriber> Layer<S> for EchoLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if self.source.subscriber_count() == 0 {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.source.publish(LogEvent {
            timestamp: Local::now(),
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.finish(),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            if !self.fields.is_empty() {
                self.fields.push(' ');
            }
            let _ = write!(self.fields, "{}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_layer_publishes_events() {
        let source = LogEventSource::new(8);
        let mut rx = source.subscribe();
        let subscriber = tracing_subscriber::registry().with(source.layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(connection_id = 7, "Socket write failed");
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, Level::WARN);
        assert_eq!(event.message, "Socket write failed connection_id=7");
        assert!(event.echo_line().contains(" WARN: Socket write failed"));
    }

    #[test]
    fn test_no_subscribers_is_silent() {
        let source = LogEventSource::new(8);
        let subscriber = tracing_subscriber::registry().with(source.layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("nobody listening");
        });
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_echo_line_format() {
        let event = LogEvent {
            timestamp: Local::now(),
            level: Level::ERROR,
            target: "test".to_string(),
            message: "boom".to_string(),
        };
        let line = event.echo_line();
        // HH:MM:SS.mmm
        assert_eq!(line.find(' '), Some(12));
        assert!(line.ends_with("ERROR: boom"));
    }
}
