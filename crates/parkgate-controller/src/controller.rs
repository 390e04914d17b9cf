//! The cooperative control cycle.
//!
//! One [`GateController`] owns the barrier state machine and every
//! peripheral of the lane. Each call to [`run_cycle`](GateController::run_cycle)
//! services, in this fixed order:
//!
//! 1. transport health and recovery
//! 2. one pending operator command
//! 3. the identity reader
//! 4. timer-driven transitions (hold window, pending motion)
//! 5. the occupancy report cadence
//!
//! A command and a scan arriving in the same cycle are therefore resolved
//! command first. Barrier sweeps and authority round-trips block the cycle
//! for their duration; nothing is serviced concurrently.

use std::future::Future;

use parkgate_core::constants::OCCUPANCY_NOT_REPORTED;
use parkgate_core::{CommandOutcome, ControlCommand, GateState};
use parkgate_hardware::{
    Actuator, BarrierPosition, DigitalInput, HardwareError, IdentityReader, InputBank,
};
use parkgate_network::{CommandReceiver, OccupancyReport, RemoteAuthority};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ControllerError, Result};
use crate::occupancy::{OccupancySampler, ReportCadence};
use crate::state_machine::{Clearance, CloseReason, GateStateMachine, StateTransition};
use crate::timing::GateTiming;

/// Peripherals of one lane.
#[derive(Debug)]
pub struct Peripherals<A, R, C, B> {
    /// Barrier motor.
    pub actuator: A,

    /// Card reader at the lane.
    pub reader: R,

    /// Vehicle-presence line under the barrier.
    pub clearance: C,

    /// Slot occupancy lines.
    pub slots: B,
}

/// Gate controller for one barrier lane.
///
/// # Example
///
/// ```no_run
/// use parkgate_controller::{GateController, GateTiming, Peripherals};
/// use parkgate_hardware::mock::{MockInputBank, MockLine, MockRfid, MockServo};
/// use parkgate_hardware::{SweepActuator, SweepConfig};
/// use parkgate_network::{AuthorityConfig, HttpAuthority, command_channel};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (servo, _) = MockServo::new();
/// let (reader, _) = MockRfid::new();
/// let (clearance, _) = MockLine::new();
/// let (slots, _) = MockInputBank::new(5);
/// let peripherals = Peripherals {
///     actuator: SweepActuator::new(servo, SweepConfig::default()),
///     reader,
///     clearance,
///     slots,
/// };
///
/// let authority = HttpAuthority::connect(AuthorityConfig::new("http://192.168.1.10:3000"))?;
/// let (_sender, commands) = command_channel(8);
///
/// let mut controller = GateController::new(peripherals, authority, commands, GateTiming::default())?;
/// controller.initialize().await?;
/// controller.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GateController<A, R, C, B, N>
where
    A: Actuator,
    R: IdentityReader,
    C: DigitalInput,
    B: InputBank,
    N: RemoteAuthority,
{
    actuator: A,
    reader: R,
    clearance: C,
    sampler: OccupancySampler<B>,
    authority: N,
    commands: CommandReceiver,
    machine: GateStateMachine,
    timing: GateTiming,
    cadence: ReportCadence,
    last_reported_occupied: i32,
    transport_cooldown_until: Option<Instant>,
}

impl<A, R, C, B, N> GateController<A, R, C, B, N>
where
    A: Actuator,
    R: IdentityReader,
    C: DigitalInput,
    B: InputBank,
    N: RemoteAuthority,
{
    /// Create a controller with the barrier assumed closed.
    ///
    /// # Errors
    ///
    /// Returns an error if `timing` is invalid.
    pub fn new(
        peripherals: Peripherals<A, R, C, B>,
        authority: N,
        commands: CommandReceiver,
        timing: GateTiming,
    ) -> Result<Self> {
        timing.validate()?;

        Ok(Self {
            actuator: peripherals.actuator,
            reader: peripherals.reader,
            clearance: peripherals.clearance,
            sampler: OccupancySampler::new(peripherals.slots),
            authority,
            commands,
            machine: GateStateMachine::new(timing.hold_grace(), timing.hold_ceiling()),
            cadence: ReportCadence::new(timing.report_cadence(), Instant::now()),
            timing,
            last_reported_occupied: OCCUPANCY_NOT_REPORTED,
            transport_cooldown_until: None,
        })
    }

    pub fn state(&self) -> GateState {
        self.machine.state()
    }

    pub fn machine(&self) -> &GateStateMachine {
        &self.machine
    }

    pub fn timing(&self) -> &GateTiming {
        &self.timing
    }

    pub fn authority(&self) -> &N {
        &self.authority
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Occupied count from the last authorization reply that carried one.
    pub fn last_reported_occupied(&self) -> i32 {
        self.last_reported_occupied
    }

    /// When the next occupancy report is due.
    pub fn next_report_due(&self) -> Instant {
        self.cadence.next_due()
    }

    /// Drive the barrier to its closed rest position and restart the
    /// report cadence.
    ///
    /// # Errors
    ///
    /// Returns an actuator fault if the barrier cannot be homed.
    pub async fn initialize(&mut self) -> Result<()> {
        info!(capacity = self.sampler.capacity(), "Homing barrier");
        self.drive(BarrierPosition::Closed).await?;
        self.cadence = ReportCadence::new(self.timing.report_cadence(), Instant::now());
        info!(state = %self.state(), "Gate controller ready");
        Ok(())
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// Shutdown is observed between cycles; a cycle in progress always
    /// completes.
    ///
    /// # Errors
    ///
    /// Returns an error only if a cycle hits an internal inconsistency.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            self.run_cycle().await?;

            tokio::select! {
                _ = &mut shutdown => {
                    info!(state = %self.state(), "Gate controller stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.timing.poll_interval()) => {}
            }
        }
    }

    /// Run one control cycle.
    ///
    /// Actuator faults, reader errors and network failures are logged and
    /// absorbed here; they never stop the cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the state machine rejects a transition the
    /// controller asked for.
    pub async fn run_cycle(&mut self) -> Result<()> {
        self.service_transport().await;
        self.service_command().await?;
        self.service_reader().await?;
        self.service_timers().await?;
        self.service_report().await;
        Ok(())
    }

    /// Apply an operator command and report what happened.
    pub async fn handle_command(&mut self, command: ControlCommand) -> CommandOutcome {
        let state = self.state();
        if state.is_moving() {
            warn!(%command, %state, "Command rejected, gate busy");
            return CommandOutcome::Busy { state };
        }

        let result = match (command, state) {
            (ControlCommand::Open, GateState::OpenHold)
            | (ControlCommand::Close, GateState::Closed) => {
                debug!(%command, %state, "Command is a no-op");
                return CommandOutcome::Unchanged { state };
            }
            (ControlCommand::Open, GateState::Closed) => self.open_gate().await,
            (ControlCommand::Close, GateState::OpenHold) => {
                self.close_gate(CloseReason::Operator).await
            }
            (_, GateState::Opening | GateState::Closing) => return CommandOutcome::Busy { state },
        };

        match result {
            Ok(()) => CommandOutcome::Applied {
                state: self.state(),
            },
            Err(e) => CommandOutcome::Failed {
                state: self.state(),
                reason: e.to_string(),
            },
        }
    }

    async fn service_transport(&mut self) {
        if self.authority.transport_ready() {
            self.transport_cooldown_until = None;
            return;
        }

        if let Some(until) = self.transport_cooldown_until
            && Instant::now() < until
        {
            trace!("Transport down, reconnect cooling down");
            return;
        }

        info!("Transport down, attempting recovery");
        if self.authority.recover_transport().await {
            self.transport_cooldown_until = None;
        } else {
            let cooldown = self.timing.transport_cooldown();
            warn!(
                cooldown_ms = self.timing.transport_cooldown_ms,
                "Transport recovery failed, backing off"
            );
            self.transport_cooldown_until = Some(Instant::now() + cooldown);
        }
    }

    async fn service_command(&mut self) -> Result<()> {
        let Some(request) = self.commands.try_next() else {
            return Ok(());
        };

        let command = request.command;
        if request.is_abandoned() {
            warn!(%command, "Dropping command, caller no longer waiting");
            return Ok(());
        }

        let outcome = self.handle_command(command).await;
        if outcome.is_accepted() {
            info!(%command, outcome = ?outcome, "Command handled");
        } else {
            warn!(%command, outcome = ?outcome, "Command not applied");
        }
        request.respond(outcome);
        Ok(())
    }

    async fn service_reader(&mut self) -> Result<()> {
        let card = match self.reader.poll_card().await {
            Ok(Some(card)) => card,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(error = %e, "Card reader poll failed");
                return Ok(());
            }
        };

        if self.state().is_closed() {
            match card.to_scan() {
                Ok(scan) => {
                    info!(uid = %scan.id, card_type = card.card_type.name(), "Card scanned");
                    let decision = self.authority.authorize(&scan.id).await;
                    if decision.reported_occupied_count != OCCUPANCY_NOT_REPORTED {
                        self.last_reported_occupied = decision.reported_occupied_count;
                    }

                    if decision.granted {
                        if let Err(e) = self.open_gate().await {
                            self.log_motion_error(&e);
                        }
                    } else {
                        info!(uid = %scan.id, reason = %decision.message, "Access denied");
                    }
                }
                Err(e) => warn!(error = %e, "Unusable card read"),
            }
        } else {
            debug!(uid = %card.uid_hex(), state = %self.state(), "Scan ignored, gate not closed");
        }

        if let Err(e) = self.reader.halt().await {
            warn!(error = %e, "Failed to halt card");
        }
        tokio::time::sleep(self.timing.scan_settle()).await;
        Ok(())
    }

    async fn service_timers(&mut self) -> Result<()> {
        let clearance = self.read_clearance().await;

        let result = match self.state() {
            GateState::OpenHold => match self.machine.close_due(Instant::now(), clearance) {
                Some(reason) => self.close_gate(reason).await,
                None => Ok(()),
            },
            GateState::Opening => {
                info!("Retrying barrier opening");
                self.complete_motion(BarrierPosition::Open).await
            }
            GateState::Closing => {
                info!("Retrying barrier closing");
                self.complete_motion(BarrierPosition::Closed).await
            }
            GateState::Closed => Ok(()),
        };

        match result {
            Err(e) if e.is_actuator_fault() => {
                self.log_motion_error(&e);
                Ok(())
            }
            other => other,
        }
    }

    async fn service_report(&mut self) {
        if !self.cadence.is_due(Instant::now()) {
            return;
        }

        match self.sampler.sample().await {
            Ok(bitmap) => {
                let report = OccupancyReport::new(&bitmap, self.authority.local_address());
                match self.authority.report(&report).await {
                    Ok(reply) => info!(
                        states = %report.states,
                        occupied = bitmap.occupied_count(),
                        total = report.total,
                        reply = %reply,
                        "Occupancy reported"
                    ),
                    Err(e) if e.is_transport() => {
                        debug!(states = %report.states, "Occupancy report skipped, transport down")
                    }
                    Err(e) => warn!(states = %report.states, error = %e, "Occupancy report failed"),
                }
            }
            Err(e) => warn!(error = %e, "Occupancy sampling failed"),
        }

        self.cadence.mark_done(Instant::now());
    }

    async fn read_clearance(&self) -> Clearance {
        match self.clearance.read_level().await {
            Ok(level) if level.is_active() => Clearance::Blocked,
            Ok(_) => Clearance::Clear,
            Err(e) => {
                warn!(error = %e, "Clearance sensor unreadable, assuming blocked");
                Clearance::Blocked
            }
        }
    }

    async fn open_gate(&mut self) -> Result<()> {
        self.transition(GateState::Opening)?;
        self.complete_motion(BarrierPosition::Open).await
    }

    async fn close_gate(&mut self, reason: CloseReason) -> Result<()> {
        info!(%reason, "Closing gate");
        self.transition(GateState::Closing)?;
        self.complete_motion(BarrierPosition::Closed).await
    }

    /// Sweep to `target` and take the automatic transition that follows.
    ///
    /// On a fault the state stays in `Opening`/`Closing` and the motion is
    /// re-driven on the next cycle.
    async fn complete_motion(&mut self, target: BarrierPosition) -> Result<()> {
        self.drive(target).await?;

        match target {
            BarrierPosition::Open => {
                self.transition(GateState::OpenHold)?;
            }
            BarrierPosition::Closed => {
                self.transition(GateState::Closed)?;
                tokio::time::sleep(self.timing.close_settle()).await;
            }
        }
        Ok(())
    }

    async fn drive(&mut self, target: BarrierPosition) -> Result<()> {
        let bound = self.timing.actuator_timeout();
        match tokio::time::timeout(bound, self.actuator.move_to(target)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ControllerError::actuator_fault(target, e)),
            Err(_) => Err(ControllerError::actuator_fault(
                target,
                HardwareError::timeout(self.timing.actuator_timeout_ms),
            )),
        }
    }

    fn transition(&mut self, to: GateState) -> Result<StateTransition> {
        let transition = self.machine.transition_to(to, Instant::now())?;
        info!(from = %transition.from, to = %transition.to, "Gate state changed");
        Ok(transition)
    }

    fn log_motion_error(&self, err: &ControllerError) {
        error!(state = %self.state(), error = %err, "Barrier motion failed");
    }
}
