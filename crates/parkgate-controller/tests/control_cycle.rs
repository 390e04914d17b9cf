//! Integration tests for the control cycle
//!
//! All tests run on tokio's paused clock: settle delays auto-advance and
//! `cycle_until` steps time explicitly, so every timing assertion is exact.

mod common;

use std::time::Duration;

use common::{Rig, cycle_until, rig, send_command};
use parkgate_controller::{GateController, GateTiming, Peripherals};
use parkgate_core::{CommandOutcome, ControlCommand, GateState};
use parkgate_hardware::mock::{MockInputBank, MockLine, MockRfid};
use parkgate_hardware::{Actuator, BarrierPosition, DeviceInfo};
use parkgate_network::{NetworkError, RemoteAuthority, command_channel};
use tokio::time::Instant;

const CARD: [u8; 4] = [0x04, 0xAB, 0xCD, 0xEF];
const STEP: Duration = Duration::from_millis(100);

fn transitions(rig: &Rig) -> Vec<(GateState, GateState)> {
    rig.controller
        .machine()
        .history()
        .iter()
        .map(|t| (t.from, t.to))
        .collect()
}

/// Time the barrier started closing, relative to when it finished opening.
fn hold_duration(rig: &Rig, opened_at: Instant) -> Duration {
    let closing = rig
        .controller
        .machine()
        .history()
        .iter()
        .rev()
        .find(|t| t.to == GateState::Closing)
        .expect("gate never started closing");
    closing.at - opened_at
}

async fn open_by_scan(rig: &mut Rig) -> Instant {
    rig.authority.grant(3);
    rig.reader.present_card(CARD.to_vec()).await.unwrap();
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(rig.controller.state(), GateState::OpenHold);
    rig.controller.machine().open_window().unwrap().started_at()
}

#[tokio::test(start_paused = true)]
async fn test_granted_scan_opens_gate() {
    let mut rig = rig().await;

    open_by_scan(&mut rig).await;

    assert_eq!(
        transitions(&rig),
        vec![
            (GateState::Closed, GateState::Opening),
            (GateState::Opening, GateState::OpenHold),
        ]
    );
    assert_eq!(rig.authority.authorized(), vec!["04ABCDEF".to_string()]);
    assert_eq!(rig.controller.last_reported_occupied(), 3);
    assert_eq!(rig.reader.halt_count(), 1);
    assert_eq!(rig.servo.last_angle(), Some(0));
    assert_eq!(
        rig.controller.actuator().position(),
        Some(BarrierPosition::Open)
    );
}

#[tokio::test(start_paused = true)]
async fn test_denied_scan_keeps_gate_closed() {
    let mut rig = rig().await;
    rig.authority.deny("Card not registered");
    rig.reader.present_card(CARD.to_vec()).await.unwrap();

    let started = Instant::now();
    rig.controller.run_cycle().await.unwrap();

    assert_eq!(rig.controller.state(), GateState::Closed);
    assert!(transitions(&rig).is_empty());
    assert!(rig.servo.written_angles().is_empty());
    assert_eq!(rig.controller.last_reported_occupied(), -1);
    // Settle delay still applies after a denied scan
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_scan_ignored_while_gate_open() {
    let mut rig = rig().await;
    open_by_scan(&mut rig).await;
    rig.clearance.set_active(true);

    rig.authority.grant(4);
    rig.reader.present_card(vec![0xDE, 0xAD, 0xBE, 0xEF]).await.unwrap();
    rig.controller.run_cycle().await.unwrap();

    assert_eq!(rig.authority.authorized().len(), 1);
    assert_eq!(rig.reader.halt_count(), 2);
    assert_eq!(rig.controller.state(), GateState::OpenHold);
    assert_eq!(rig.controller.last_reported_occupied(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_closes_blocked_lane() {
    let mut rig = rig().await;
    rig.clearance.set_active(true);
    let opened_at = open_by_scan(&mut rig).await;

    cycle_until(&mut rig.controller, STEP, 200, |c| {
        c.state() != GateState::OpenHold
    })
    .await;

    assert_eq!(hold_duration(&rig, opened_at), Duration::from_millis(10_000));
    assert_eq!(rig.controller.state(), GateState::Closed);
    assert_eq!(rig.servo.last_angle(), Some(150));
}

#[tokio::test(start_paused = true)]
async fn test_grace_closes_cleared_lane() {
    let mut rig = rig().await;
    rig.clearance.set_active(true);
    let opened_at = open_by_scan(&mut rig).await;

    // The scan cycle ended one settle delay after opening
    assert_eq!(Instant::now() - opened_at, Duration::from_millis(1000));
    rig.clearance.set_active(false);

    cycle_until(&mut rig.controller, STEP, 200, |c| {
        c.state() != GateState::OpenHold
    })
    .await;

    assert_eq!(hold_duration(&rig, opened_at), Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_clearance_counts_as_blocked() {
    let mut rig = rig().await;
    let opened_at = open_by_scan(&mut rig).await;
    rig.clearance.set_failing(true);

    cycle_until(&mut rig.controller, STEP, 200, |c| {
        c.state() != GateState::OpenHold
    })
    .await;

    assert_eq!(hold_duration(&rig, opened_at), Duration::from_millis(10_000));
}

#[tokio::test(start_paused = true)]
async fn test_operator_close_bypasses_timers() {
    let mut rig = rig().await;
    rig.clearance.set_active(true);
    let opened_at = open_by_scan(&mut rig).await;

    let pending = send_command(&rig.commands, ControlCommand::Close).await;
    rig.controller.run_cycle().await.unwrap();

    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::Applied {
            state: GateState::Closed
        }
    );
    assert!(hold_duration(&rig, opened_at) < Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_operator_open_and_no_ops() {
    let mut rig = rig().await;

    let pending = send_command(&rig.commands, ControlCommand::Close).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        CommandOutcome::Unchanged {
            state: GateState::Closed
        }
    );
    assert!(rig.servo.written_angles().is_empty());

    let pending = send_command(&rig.commands, ControlCommand::Open).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        CommandOutcome::Applied {
            state: GateState::OpenHold
        }
    );

    rig.servo.clear_history();
    let pending = send_command(&rig.commands, ControlCommand::Open).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        CommandOutcome::Unchanged {
            state: GateState::OpenHold
        }
    );
    // Already open: the actuator is not re-driven
    assert!(rig.servo.written_angles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_command_served_before_scan() {
    let mut rig = rig().await;
    rig.authority.grant(1);
    rig.reader.present_card(CARD.to_vec()).await.unwrap();
    let pending = send_command(&rig.commands, ControlCommand::Open).await;

    rig.controller.run_cycle().await.unwrap();

    assert_eq!(
        pending.await.unwrap().unwrap(),
        CommandOutcome::Applied {
            state: GateState::OpenHold
        }
    );
    // The gate was already open when the scan was looked at
    assert!(rig.authority.authorized().is_empty());
    assert_eq!(rig.reader.halt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_command_dropped_after_caller_timed_out() {
    let mut rig = rig().await;

    // Caller gives up before any cycle serves the request
    let result = rig
        .commands
        .submit(ControlCommand::Open, Duration::from_millis(500))
        .await;
    assert!(matches!(result, Err(NetworkError::Timeout(500))));

    rig.controller.run_cycle().await.unwrap();

    assert_eq!(rig.controller.state(), GateState::Closed);
    assert!(transitions(&rig).is_empty());
    assert!(rig.servo.written_angles().is_empty());

    // A caller still waiting is served normally
    let pending = send_command(&rig.commands, ControlCommand::Open).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        CommandOutcome::Applied {
            state: GateState::OpenHold
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_jammed_barrier_stays_opening_and_is_busy() {
    let mut rig = rig().await;
    rig.servo.jam_at(90);

    rig.authority.grant(2);
    rig.reader.present_card(CARD.to_vec()).await.unwrap();
    rig.controller.run_cycle().await.unwrap();

    assert_eq!(rig.controller.state(), GateState::Opening);
    assert!(rig.controller.machine().open_window().is_none());

    let pending = send_command(&rig.commands, ControlCommand::Open).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        CommandOutcome::Busy {
            state: GateState::Opening
        }
    );
    assert_eq!(rig.controller.state(), GateState::Opening);

    // Freed arm: the pending motion completes on the next cycle
    rig.servo.release();
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(rig.controller.state(), GateState::OpenHold);
    assert!(rig.controller.machine().is_consistent());
}

#[tokio::test(start_paused = true)]
async fn test_failed_operator_open_reports_fault() {
    let mut rig = rig().await;
    rig.servo.jam_at(90);

    let pending = send_command(&rig.commands, ControlCommand::Open).await;
    rig.controller.run_cycle().await.unwrap();

    match pending.await.unwrap().unwrap() {
        CommandOutcome::Failed { state, reason } => {
            assert_eq!(state, GateState::Opening);
            assert!(reason.contains("Position not reached"));
        }
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_occupancy_reported_on_cadence() {
    let mut rig = rig().await;
    let start = Instant::now();
    rig.slots.set_active(0, true).unwrap();
    rig.slots.set_active(3, true).unwrap();

    cycle_until(&mut rig.controller, STEP, 300, |c| {
        c.authority().reports().len() == 2
    })
    .await;

    let reports = rig.authority.reports();
    assert_eq!(reports[0].0 - start, Duration::from_secs(10));
    assert_eq!(reports[1].0 - start, Duration::from_secs(20));
    assert_eq!(reports[0].1.states, "10010");
    assert_eq!(reports[0].1.total, 5);
    assert_eq!(reports[0].1.ip, "10.0.0.7");
}

#[tokio::test(start_paused = true)]
async fn test_cadence_measured_from_end_of_report_cycle() {
    let mut rig = rig().await;
    let start = Instant::now();

    // A scan just before the first report delays it by the settle time
    tokio::time::advance(Duration::from_millis(9_500)).await;
    rig.reader.present_card(CARD.to_vec()).await.unwrap();
    rig.controller.run_cycle().await.unwrap();

    let reports = rig.authority.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0 - start, Duration::from_millis(10_500));
    assert_eq!(
        rig.controller.next_report_due() - start,
        Duration::from_millis(20_500)
    );
}

#[tokio::test(start_paused = true)]
async fn test_report_failure_does_not_disturb_gate() {
    let mut rig = rig().await;
    rig.authority.fail_reports(true);
    rig.clearance.set_active(true);

    cycle_until(&mut rig.controller, STEP, 200, |c| {
        Instant::now() >= c.next_report_due() - Duration::from_millis(100)
    })
    .await;
    let opened_at = open_by_scan(&mut rig).await;
    assert!(rig.authority.reports().is_empty());

    rig.authority.fail_reports(false);
    cycle_until(&mut rig.controller, STEP, 200, |c| {
        c.state() != GateState::OpenHold
    })
    .await;

    assert_eq!(hold_duration(&rig, opened_at), Duration::from_millis(10_000));

    // Next tick after the failed one goes through
    cycle_until(&mut rig.controller, STEP, 200, |c| {
        !c.authority().reports().is_empty()
    })
    .await;
    assert_eq!(rig.controller.state(), GateState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_transport_down_fails_closed_but_serves_commands() {
    let mut rig = rig().await;
    rig.authority.set_transport(false);

    rig.authority.grant(1);
    rig.reader.present_card(CARD.to_vec()).await.unwrap();
    rig.controller.run_cycle().await.unwrap();

    assert_eq!(rig.authority.recover_calls(), 1);
    assert_eq!(rig.controller.state(), GateState::Closed);
    assert!(rig.authority.authorized().is_empty());

    let pending = send_command(&rig.commands, ControlCommand::Open).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        CommandOutcome::Applied {
            state: GateState::OpenHold
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_cooldown() {
    let mut rig = rig().await;
    rig.authority.set_transport(false);
    rig.authority.script_recoveries(&[false, true]);

    rig.controller.run_cycle().await.unwrap();
    assert_eq!(rig.authority.recover_calls(), 1);

    // Cooling down: no attempt for 30 s
    for _ in 0..299 {
        tokio::time::advance(STEP).await;
        rig.controller.run_cycle().await.unwrap();
    }
    assert_eq!(rig.authority.recover_calls(), 1);

    tokio::time::advance(STEP).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(rig.authority.recover_calls(), 2);
    assert!(rig.authority.transport_ready());

    tokio::time::advance(STEP).await;
    rig.controller.run_cycle().await.unwrap();
    assert_eq!(rig.authority.recover_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_shutdown() {
    let mut rig = rig().await;

    rig.controller
        .run(tokio::time::sleep(Duration::from_millis(25_050)))
        .await
        .unwrap();

    assert_eq!(rig.authority.reports().len(), 2);
    assert_eq!(rig.controller.state(), GateState::Closed);
}

/// Barrier that homes fine but never finishes opening.
#[derive(Debug, Default)]
struct StuckActuator {
    position: Option<BarrierPosition>,
}

impl Actuator for StuckActuator {
    async fn move_to(&mut self, target: BarrierPosition) -> parkgate_hardware::Result<()> {
        if target == BarrierPosition::Open {
            std::future::pending::<()>().await;
        }
        self.position = Some(target);
        Ok(())
    }

    fn position(&self) -> Option<BarrierPosition> {
        self.position
    }

    async fn get_info(&self) -> parkgate_hardware::Result<DeviceInfo> {
        Ok(DeviceInfo::new("Stuck barrier", "Test actuator"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_actuator_timeout_is_a_fault() {
    let (reader, _reader) = MockRfid::new();
    let (clearance, _clearance) = MockLine::new();
    let (slots, _slots) = MockInputBank::new(common::TEST_CAPACITY);
    let (sender, receiver) = command_channel(4);
    let peripherals = Peripherals {
        actuator: StuckActuator::default(),
        reader,
        clearance,
        slots,
    };
    let mut controller = GateController::new(
        peripherals,
        common::ScriptedAuthority::new(),
        receiver,
        GateTiming::default(),
    )
    .unwrap();
    controller.initialize().await.unwrap();

    let pending = send_command(&sender, ControlCommand::Open).await;
    let started = Instant::now();
    controller.run_cycle().await.unwrap();

    match pending.await.unwrap().unwrap() {
        CommandOutcome::Failed { state, reason } => {
            assert_eq!(state, GateState::Opening);
            assert!(reason.contains("timeout after 5000ms"), "{reason}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_millis(5000));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_timing_rejected() {
    let (reader, _reader) = MockRfid::new();
    let (clearance, _clearance) = MockLine::new();
    let (slots, _slots) = MockInputBank::new(1);
    let (_sender, receiver) = command_channel(1);
    let peripherals = Peripherals {
        actuator: StuckActuator::default(),
        reader,
        clearance,
        slots,
    };
    let timing = GateTiming {
        hold_grace_ms: 20_000,
        ..GateTiming::default()
    };

    let result = GateController::new(
        peripherals,
        common::ScriptedAuthority::new(),
        receiver,
        timing,
    );
    assert!(result.is_err());
}
