// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchEvent {
    TouchStart(Point),
    TouchMove(Point),
    TouchEnd(Point),
}

impl TouchEvent {
    pub fn position(&self) -> Point {
        match *self {
            TouchEvent::TouchStart(p) | TouchEvent::TouchMove(p) | TouchEvent::TouchEnd(p) => p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Left,
    Right,
}

bitflags! {
    /// Physical buttons currently held down.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ButtonMask: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
    }
}

impl From<Button> for ButtonMask {
    fn from(button: Button) -> Self {
        match button {
            Button::Left => ButtonMask::LEFT,
            Button::Right => ButtonMask::RIGHT,
        }
    }
}

/// Input produced by the host UI or a test harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEvent {
    Button { button: Button, pressed: bool },
    Touch(TouchEvent),
    /// Host window closed.
    Quit,
}

/// Simulated input peripherals as seen by bootloader logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    pub buttons: ButtonMask,
    /// Finger position while a touch is in progress.
    pub touch: Option<Point>,
    pub last_touch: Option<TouchEvent>,
    pub quit_requested: bool,
}

impl InputState {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons.contains(button.into())
    }

    fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::Button { button, pressed } => {
                self.buttons.set(button.into(), pressed);
            }
            HostEvent::Touch(touch) => {
                self.touch = match touch {
                    TouchEvent::TouchStart(p) | TouchEvent::TouchMove(p) => Some(p),
                    TouchEvent::TouchEnd(_) => None,
                };
                self.last_touch = Some(touch);
            }
            HostEvent::Quit => self.quit_requested = true,
        }
    }
}

/// Cooperative, non-blocking host event queue.
#[derive(Debug, Default)]
pub struct EventPump {
    pending: VecDeque<HostEvent>,
    /// Events released on a specific poll, ordered by poll index.
    scheduled: VecDeque<(u64, HostEvent)>,
    input: InputState,
    polls: u64,
    processed: u64,
}

impl EventPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event for the next `poll_events` call.
    pub fn inject(&mut self, event: HostEvent) {
        self.pending.push_back(event);
    }

    /// Queues an event to become visible on the poll with zero-based index
    /// `at_poll`. Indices already passed are delivered on the next poll.
    pub fn schedule(&mut self, at_poll: u64, event: HostEvent) {
        let idx = self.scheduled.partition_point(|(p, _)| *p <= at_poll);
        self.scheduled.insert(idx, (at_poll, event));
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drains every event that arrived since the previous call and returns
    /// how many were applied.
    pub fn poll_events(&mut self) -> usize {
        while let Some((at, _)) = self.scheduled.front() {
            if *at > self.polls {
                break;
            }
            if let Some((_, event)) = self.scheduled.pop_front() {
                self.pending.push_back(event);
            }
        }

        let mut count = 0;
        while let Some(event) = self.pending.pop_front() {
            tracing::trace!("poll #{}: {:?}", self.polls, event);
            self.input.apply(event);
            count += 1;
        }

        self.polls += 1;
        self.processed += count as u64;
        count
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn events_processed(&self) -> u64 {
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_idle_poll_is_immediate_and_pure() {
        let mut pump = EventPump::new();
        let before = *pump.input();

        let start = Instant::now();
        for _ in 0..1000 {
            assert_eq!(pump.poll_events(), 0);
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        assert_eq!(*pump.input(), before);
        assert_eq!(pump.events_processed(), 0);
        assert_eq!(pump.polls(), 1000);
    }

    #[test]
    fn test_poll_drains_in_order() {
        let mut pump = EventPump::new();
        pump.inject(HostEvent::Button {
            button: Button::Left,
            pressed: true,
        });
        pump.inject(HostEvent::Button {
            button: Button::Right,
            pressed: true,
        });
        pump.inject(HostEvent::Button {
            button: Button::Left,
            pressed: false,
        });
        assert!(pump.has_pending());

        assert_eq!(pump.poll_events(), 3);
        assert!(!pump.has_pending());
        assert!(!pump.input().is_pressed(Button::Left));
        assert!(pump.input().is_pressed(Button::Right));

        // Already drained
        assert_eq!(pump.poll_events(), 0);
    }

    #[test]
    fn test_touch_tracking() {
        let mut pump = EventPump::new();
        pump.inject(HostEvent::Touch(TouchEvent::TouchStart(Point::new(10, 20))));
        pump.inject(HostEvent::Touch(TouchEvent::TouchMove(Point::new(12, 22))));
        pump.poll_events();
        assert_eq!(pump.input().touch, Some(Point::new(12, 22)));

        pump.inject(HostEvent::Touch(TouchEvent::TouchEnd(Point::new(12, 23))));
        pump.poll_events();
        assert_eq!(pump.input().touch, None);
        assert_eq!(
            pump.input().last_touch,
            Some(TouchEvent::TouchEnd(Point::new(12, 23)))
        );
    }

    #[test]
    fn test_scheduled_events_release_on_their_poll() {
        let mut pump = EventPump::new();
        pump.schedule(2, HostEvent::Quit);
        pump.schedule(
            0,
            HostEvent::Button {
                button: Button::Right,
                pressed: true,
            },
        );

        assert_eq!(pump.poll_events(), 1); // poll 0
        assert!(pump.input().is_pressed(Button::Right));
        assert_eq!(pump.poll_events(), 0); // poll 1
        assert!(!pump.input().quit_requested);
        assert_eq!(pump.poll_events(), 1); // poll 2
        assert!(pump.input().quit_requested);
    }

    #[test]
    fn test_late_schedule_delivers_next_poll() {
        let mut pump = EventPump::new();
        pump.poll_events();
        pump.poll_events();
        pump.schedule(0, HostEvent::Quit);
        assert_eq!(pump.poll_events(), 1);
        assert!(pump.input().quit_requested);
    }

    #[test]
    fn test_event_serde_shape() {
        let ev: HostEvent =
            serde_json::from_str(r#"{"button":{"button":"left","pressed":true}}"#).unwrap();
        assert_eq!(
            ev,
            HostEvent::Button {
                button: Button::Left,
                pressed: true
            }
        );

        let ev: HostEvent = serde_json::from_str(r#""quit""#).unwrap();
        assert_eq!(ev, HostEvent::Quit);

        let ev: HostEvent =
            serde_json::from_str(r#"{"touch":{"touch_end":{"x":1,"y":2}}}"#).unwrap();
        assert_eq!(ev, HostEvent::Touch(TouchEvent::TouchEnd(Point::new(1, 2))));
    }
}
