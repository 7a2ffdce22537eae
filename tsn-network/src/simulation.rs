use crate::error::{ConfigError, SimulationError};
use crate::network::TsnNetwork;
use crate::network::gcl::{GateControlList, GateControlListSpec, GateVector};
use crate::network::queue::{AlwaysAdmit, EmergencyAdmission};
use crate::network::spec::{NetworkSpec, TrafficSpec};
use crate::stats_tracker::{NetworkStats, NetworkStatsTracker};
use crate::trace::simulation_verifier::SimulationVerifier;
use crate::trace::tracer::SimulationStepTracer;
use crate::Tick;
use fastrand::Rng;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// The amount of ticks to simulate
    pub ticks: Tick,
    /// Bytes a link transfers per tick
    pub byte_budget: u32,
    /// Chance that a switch redirects an incoming ST packet to its emergency lanes
    pub emergency_probability: f64,
    pub rng_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 100,
            byte_budget: 16,
            emergency_probability: 0.0,
            rng_seed: 42,
        }
    }
}

/// Everything a tick phase may read or update besides the network itself
pub(crate) struct SimulationContext<'a> {
    pub(crate) now: Tick,
    pub(crate) gates: GateVector,
    pub(crate) byte_budget: u32,
    pub(crate) emergency_probability: f64,
    pub(crate) rng: &'a mut Rng,
    pub(crate) admission: &'a dyn EmergencyAdmission,
    pub(crate) stats: &'a mut NetworkStatsTracker,
    pub(crate) tracer: &'a mut SimulationStepTracer,
}

/// Drives the network tick by tick
pub struct Simulation {
    network: TsnNetwork,
    gcl: GateControlList,
    config: SimulationConfig,
    clock: Tick,
    rng: Rng,
    admission: Box<dyn EmergencyAdmission>,
    stats: NetworkStatsTracker,
    tracer: SimulationStepTracer,
    halted: Option<SimulationError>,
}

impl Simulation {
    pub fn new(
        network: NetworkSpec,
        traffic: TrafficSpec,
        gcl: GateControlListSpec,
        config: SimulationConfig,
    ) -> Result<Self, ConfigError> {
        if config.byte_budget == 0 {
            return Err(ConfigError::ZeroByteBudget);
        }

        if !(0.0..=1.0).contains(&config.emergency_probability) {
            return Err(ConfigError::InvalidEmergencyProbability {
                probability: config.emergency_probability,
            });
        }

        let mut rng = Rng::with_seed(config.rng_seed);
        let gcl = GateControlList::new(gcl)?;
        let tracer = SimulationStepTracer::new(&network);
        let network = TsnNetwork::initialize(&network, traffic, &mut rng)?;
        let stats = NetworkStatsTracker::new(network.switches().iter().map(|s| s.id()));

        Ok(Self {
            network,
            gcl,
            config,
            clock: 0,
            rng,
            admission: Box::new(AlwaysAdmit),
            stats,
            tracer,
            halted: None,
        })
    }

    /// Replaces the policy deciding which packets may enter the emergency lanes
    pub fn with_admission(mut self, admission: impl EmergencyAdmission + 'static) -> Self {
        self.admission = Box::new(admission);
        self
    }

    /// Runs the remaining ticks, stopping at the first fatal error
    pub fn run(&mut self) -> Result<(), SimulationError> {
        info!(
            "running simulation for {} ticks (byte budget {})",
            self.config.ticks, self.config.byte_budget
        );

        while !self.is_finished() {
            self.step()?;
        }

        Ok(())
    }

    /// Runs a single tick
    ///
    /// A fatal error halts the simulation for good: the clock stays at the failing tick and
    /// further calls return the same error. Once the tick budget is spent, calls do nothing.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        if let Some(error) = &self.halted {
            return Err(error.clone());
        }

        if self.clock >= self.config.ticks {
            return Ok(());
        }

        let result = self.run_tick();
        match &result {
            Ok(()) => self.clock += 1,
            Err(error) => self.halted = Some(error.clone()),
        }

        result
    }

    fn run_tick(&mut self) -> Result<(), SimulationError> {
        let now = self.clock;
        self.gcl.advance_to(now);
        let gates = self.gcl.state_at(now).unwrap_or(GateVector::ALL_CLOSED);
        debug!("tick {now}: gates {gates}");

        let mut ctx = SimulationContext {
            now,
            gates,
            byte_budget: self.config.byte_budget,
            emergency_probability: self.config.emergency_probability,
            rng: &mut self.rng,
            admission: self.admission.as_ref(),
            stats: &mut self.stats,
            tracer: &mut self.tracer,
        };

        self.network.generate_traffic(&mut ctx);
        self.network.classify_ingress(&mut ctx)?;
        self.network.schedule_lanes(&ctx);
        self.network.arbitrate_egress(&mut ctx)?;
        self.network.flush_and_digest(&mut ctx)?;

        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.clock >= self.config.ticks || self.halted.is_some()
    }

    /// The next tick to run, or the tick that failed
    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn network(&self) -> &TsnNetwork {
        &self.network
    }

    pub fn gcl(&self) -> &GateControlList {
        &self.gcl
    }

    pub fn stats(&self) -> &NetworkStats {
        self.stats.stats()
    }

    pub fn tracer(&self) -> &SimulationStepTracer {
        &self.tracer
    }

    pub fn verifier(&self) -> SimulationVerifier {
        self.tracer.verifier()
    }

    pub fn halted_by(&self) -> Option<&SimulationError> {
        self.halted.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod test_context {
    use super::*;
    use crate::NodeId;

    /// Owns the state a [`SimulationContext`] borrows, for exercising single phases
    pub(crate) struct TestContext {
        pub(crate) rng: Rng,
        pub(crate) admission: AlwaysAdmit,
        pub(crate) stats: NetworkStatsTracker,
        pub(crate) tracer: SimulationStepTracer,
    }

    impl TestContext {
        pub(crate) fn new() -> Self {
            Self {
                rng: Rng::with_seed(42),
                admission: AlwaysAdmit,
                stats: NetworkStatsTracker::new([NodeId(10)].into_iter()),
                tracer: SimulationStepTracer::new(&NetworkSpec { nodes: Vec::new() }),
            }
        }

        pub(crate) fn at(&mut self, now: Tick, gates: GateVector) -> SimulationContext<'_> {
            SimulationContext {
                now,
                gates,
                byte_budget: 16,
                emergency_probability: 0.0,
                rng: &mut self.rng,
                admission: &self.admission,
                stats: &mut self.stats,
                tracer: &mut self.tracer,
            }
        }
    }
}
