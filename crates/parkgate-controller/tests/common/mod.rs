//! Common test utilities for the gate controller integration tests.
//!
//! [`rig`] builds a controller over mock peripherals and a scripted
//! authority, and hands back every control handle so a test can play the
//! part of the vehicle, the card holder and the operator.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parkgate_controller::{GateController, GateTiming, Peripherals};
use parkgate_core::{AuthorizationDecision, CommandOutcome, ControlCommand};
use parkgate_hardware::mock::{
    MockInputBank, MockInputBankHandle, MockLine, MockLineHandle, MockRfid, MockRfidHandle,
    MockServo, MockServoHandle,
};
use parkgate_hardware::{SweepActuator, SweepConfig};
use parkgate_network::{
    CommandSender, NetworkError, OccupancyReport, RemoteAuthority, command_channel,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const TEST_CAPACITY: usize = 5;

#[derive(Debug)]
struct Script {
    decisions: VecDeque<AuthorizationDecision>,
    authorized: Vec<String>,
    reports: Vec<(Instant, OccupancyReport)>,
    transport_up: bool,
    recoveries: VecDeque<bool>,
    recover_calls: usize,
    fail_reports: bool,
}

/// Remote authority answering from a script.
///
/// Clones share the script, so a test keeps one clone while the controller
/// owns another.
#[derive(Debug, Clone)]
pub struct ScriptedAuthority {
    script: Arc<Mutex<Script>>,
}

impl ScriptedAuthority {
    /// Authority with the transport up and no scripted decisions.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                decisions: VecDeque::new(),
                authorized: Vec::new(),
                reports: Vec::new(),
                transport_up: true,
                recoveries: VecDeque::new(),
                recover_calls: 0,
                fail_reports: false,
            })),
        }
    }

    pub fn push_decision(&self, decision: AuthorizationDecision) {
        self.script.lock().unwrap().decisions.push_back(decision);
    }

    pub fn grant(&self, occupied: i32) {
        self.push_decision(AuthorizationDecision {
            granted: true,
            reported_occupied_count: occupied,
            message: "Welcome".to_string(),
            plate: Some("51F-12345".to_string()),
            fee: None,
        });
    }

    pub fn deny(&self, message: &str) {
        self.push_decision(AuthorizationDecision::denied(message));
    }

    pub fn set_transport(&self, up: bool) {
        self.script.lock().unwrap().transport_up = up;
    }

    /// Results of the next recovery attempts; unscripted attempts fail.
    pub fn script_recoveries(&self, results: &[bool]) {
        self.script
            .lock()
            .unwrap()
            .recoveries
            .extend(results.iter().copied());
    }

    pub fn fail_reports(&self, fail: bool) {
        self.script.lock().unwrap().fail_reports = fail;
    }

    pub fn authorized(&self) -> Vec<String> {
        self.script.lock().unwrap().authorized.clone()
    }

    pub fn reports(&self) -> Vec<(Instant, OccupancyReport)> {
        self.script.lock().unwrap().reports.clone()
    }

    pub fn recover_calls(&self) -> usize {
        self.script.lock().unwrap().recover_calls
    }
}

impl RemoteAuthority for ScriptedAuthority {
    fn transport_ready(&self) -> bool {
        self.script.lock().unwrap().transport_up
    }

    async fn recover_transport(&self) -> bool {
        let mut script = self.script.lock().unwrap();
        script.recover_calls += 1;
        let up = script.recoveries.pop_front().unwrap_or(false);
        script.transport_up = up;
        up
    }

    fn local_address(&self) -> Option<IpAddr> {
        Some("10.0.0.7".parse().unwrap())
    }

    async fn authorize(&self, uid: &str) -> AuthorizationDecision {
        let mut script = self.script.lock().unwrap();
        if !script.transport_up {
            return AuthorizationDecision::denied("transport unavailable");
        }
        script.authorized.push(uid.to_string());
        script
            .decisions
            .pop_front()
            .unwrap_or_else(|| AuthorizationDecision::denied("no scripted decision"))
    }

    async fn report(&self, report: &OccupancyReport) -> Result<String, NetworkError> {
        let mut script = self.script.lock().unwrap();
        if !script.transport_up {
            return Err(NetworkError::TransportUnavailable);
        }
        if script.fail_reports {
            return Err(NetworkError::Status(500));
        }
        script.reports.push((Instant::now(), report.clone()));
        Ok("Slots updated".to_string())
    }
}

pub type TestController =
    GateController<SweepActuator<MockServo>, MockRfid, MockLine, MockInputBank, ScriptedAuthority>;

pub struct Rig {
    pub controller: TestController,
    pub servo: MockServoHandle,
    pub reader: MockRfidHandle,
    pub clearance: MockLineHandle,
    pub slots: MockInputBankHandle,
    pub authority: ScriptedAuthority,
    pub commands: CommandSender,
}

/// Sweep that completes without sleeping.
pub fn instant_sweep() -> SweepConfig {
    SweepConfig {
        step_delay_ms: 0,
        ..SweepConfig::default()
    }
}

/// Controller over mocks, homed and ready. Call with the clock paused.
pub async fn rig() -> Rig {
    rig_with(GateTiming::default(), instant_sweep()).await
}

pub async fn rig_with(timing: GateTiming, sweep: SweepConfig) -> Rig {
    let (servo, servo_handle) = MockServo::new();
    let (reader, reader_handle) = MockRfid::new();
    let (clearance, clearance_handle) = MockLine::new();
    let (slots, slots_handle) = MockInputBank::new(TEST_CAPACITY);
    let authority = ScriptedAuthority::new();
    let (sender, receiver) = command_channel(4);

    let peripherals = Peripherals {
        actuator: SweepActuator::new(servo, sweep),
        reader,
        clearance,
        slots,
    };

    let mut controller =
        GateController::new(peripherals, authority.clone(), receiver, timing).unwrap();
    controller.initialize().await.unwrap();
    servo_handle.clear_history();

    Rig {
        controller,
        servo: servo_handle,
        reader: reader_handle,
        clearance: clearance_handle,
        slots: slots_handle,
        authority,
        commands: sender,
    }
}

/// Submit a command from a separate task, as the endpoint would.
pub async fn send_command(
    sender: &CommandSender,
    command: ControlCommand,
) -> JoinHandle<Result<CommandOutcome, NetworkError>> {
    let sender = sender.clone();
    let handle =
        tokio::spawn(async move { sender.submit(command, Duration::from_secs(60)).await });
    // Let the task enqueue its request
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    handle
}

/// Run cycles, advancing the clock by `step` before each, until `done`
/// holds or `limit` cycles ran. Returns the number of cycles.
pub async fn cycle_until(
    controller: &mut TestController,
    step: Duration,
    limit: usize,
    mut done: impl FnMut(&TestController) -> bool,
) -> usize {
    for n in 1..=limit {
        tokio::time::advance(step).await;
        controller.run_cycle().await.unwrap();
        if done(controller) {
            return n;
        }
    }
    panic!("condition not reached after {limit} cycles");
}
