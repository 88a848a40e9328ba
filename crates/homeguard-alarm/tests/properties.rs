//! Property tests over arbitrary command sequences, plus thread races on the
//! controllers.

use homeguard_alarm::{AlarmController, AlertEvent, ModeController, RecordingNotifier, SharedState};
use homeguard_core::{TagId, TriggerOutcome};
use homeguard_hardware::Indicator;
use homeguard_hardware::mock::MockIndicator;
use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug, Clone)]
enum Op {
    Trigger(&'static str),
    Reset,
    Arm,
    Disarm,
    Card(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::sample::select(vec!["motion", "distance<30cm", "emergency"])
            .prop_map(Op::Trigger),
        1 => Just(Op::Reset),
        1 => Just(Op::Arm),
        1 => Just(Op::Disarm),
        1 => any::<u64>().prop_map(Op::Card),
    ]
}

fn rig() -> (AlarmController, ModeController, MockIndicator, RecordingNotifier) {
    let led = MockIndicator::new();
    let recorder = RecordingNotifier::new();
    let alarm = AlarmController::new(
        SharedState::default(),
        Arc::new(led.clone()),
        Arc::new(recorder.clone()),
    );
    let mode = ModeController::new(alarm.clone());
    (alarm, mode, led, recorder)
}

proptest! {
    #[test]
    fn state_stays_consistent(ops in prop::collection::vec(op(), 1..64)) {
        let (alarm, mode, led, recorder) = rig();

        for op in ops {
            let before = alarm.state().snapshot();
            recorder.take();

            match op {
                Op::Trigger(reason) => {
                    let outcome = alarm.trigger(reason);
                    let after = alarm.state().snapshot();
                    let alarms = recorder
                        .events()
                        .iter()
                        .filter(|e| matches!(e, AlertEvent::Alarm { .. }))
                        .count();

                    match outcome {
                        TriggerOutcome::Raised => {
                            prop_assert!(before.armed && !before.alarm_active);
                            prop_assert_eq!(after.alarm_reason.as_deref(), Some(reason));
                            prop_assert_eq!(alarms, 1);
                        }
                        // A trigger that does not raise leaves state untouched.
                        TriggerOutcome::AlreadyActive | TriggerOutcome::Disarmed => {
                            prop_assert_eq!(&after, &before);
                            prop_assert_eq!(alarms, 0);
                        }
                    }
                }
                Op::Reset => {
                    alarm.reset();
                    let after = alarm.state().snapshot();
                    prop_assert!(!after.alarm_active);
                    prop_assert_eq!(after.armed, before.armed);
                    prop_assert!(recorder.is_empty());
                }
                Op::Arm => {
                    mode.arm();
                    prop_assert!(alarm.state().is_armed());
                    prop_assert!(!alarm.state().alarm_active());
                }
                Op::Disarm => {
                    mode.disarm();
                    prop_assert!(!alarm.state().is_armed());
                    prop_assert!(!alarm.state().alarm_active());
                }
                Op::Card(id) => {
                    mode.card_toggle(TagId::new(id));
                    let after = alarm.state().snapshot();
                    prop_assert_eq!(after.armed, !before.alarm_active);
                    prop_assert!(!after.alarm_active);
                    prop_assert_eq!(after.last_tag, Some(TagId::new(id)));
                    prop_assert_eq!(recorder.len(), 2);
                }
            }

            let after = alarm.state().snapshot();
            prop_assert!(after.check_invariants().is_ok());
            prop_assert_eq!(led.is_on(), after.alarm_active);
        }
    }

    #[test]
    fn disarmed_triggers_are_inert(reasons in prop::collection::vec("[a-z<0-9]{1,16}", 1..32)) {
        let (alarm, mode, led, recorder) = rig();
        mode.disarm();
        recorder.take();
        let before = alarm.state().snapshot();

        for reason in &reasons {
            prop_assert_eq!(alarm.trigger(reason), TriggerOutcome::Disarmed);
        }

        prop_assert_eq!(alarm.state().snapshot(), before);
        prop_assert!(!led.is_on());
        prop_assert!(recorder.is_empty());
    }
}

const RACERS: usize = 8;

fn alarm_events(recorder: &RecordingNotifier) -> Vec<AlertEvent> {
    recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, AlertEvent::Alarm { .. }))
        .collect()
}

#[test]
fn concurrent_triggers_raise_one_episode() {
    for _ in 0..100 {
        let (alarm, _mode, led, recorder) = rig();
        let barrier = Barrier::new(RACERS);

        let outcomes: Vec<TriggerOutcome> = thread::scope(|s| {
            let racers: Vec<_> = (0..RACERS)
                .map(|i| {
                    let (alarm, barrier) = (&alarm, &barrier);
                    let reason = if i % 2 == 0 { "motion" } else { "distance<30cm" };
                    s.spawn(move || {
                        barrier.wait();
                        alarm.trigger(reason)
                    })
                })
                .collect();
            racers.into_iter().map(|r| r.join().unwrap()).collect()
        });

        let raised = outcomes
            .iter()
            .filter(|o| **o == TriggerOutcome::Raised)
            .count();
        assert_eq!(raised, 1, "{:?}", outcomes);

        let alarms = alarm_events(&recorder);
        assert_eq!(alarms.len(), 1);
        assert_eq!(led.on_count(), 1);

        // The reported sensor is the reason that won the race.
        let state = alarm.state().snapshot();
        assert!(state.alarm_active);
        match &alarms[0] {
            AlertEvent::Alarm { sensor, .. } => {
                assert_eq!(state.alarm_reason.as_deref(), Some(sensor.as_str()))
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}

#[test]
fn disarm_racing_trigger_never_leaves_alarm_on() {
    for _ in 0..200 {
        let (alarm, mode, led, recorder) = rig();
        let barrier = Barrier::new(2);

        thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                alarm.trigger("motion");
            });
            s.spawn(|| {
                barrier.wait();
                mode.disarm();
            });
        });

        let state = alarm.state().snapshot();
        assert!(!state.armed);
        assert!(!state.alarm_active);
        assert!(state.check_invariants().is_ok());
        assert!(!led.is_on());
        // Either the trigger lost outright or its episode was cleared by the disarm.
        assert_eq!(alarm_events(&recorder).len(), led.on_count());
    }
}
